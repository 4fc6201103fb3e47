//! Telemetry module - statistics records and application delivery
//!
//! Human-readable trace lines go through `tracing`. This module carries the
//! structured side channel: one [`StatsRecord`] per frame sent, reply awaited
//! or payload received, plus the INFO payloads handed to the application.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::contracts::{MessageKind, NodeAddress};
use crate::errors::Result;

/// Header row of the statistics CSV
pub const STATS_CSV_HEADER: &str = "Timestamp,MessageType,Size,Source,Destination,Success";

/// One statistics entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    /// Message kind the entry is about
    pub kind: MessageKind,

    /// Payload size in bytes
    pub size: usize,

    /// Sending node
    pub source: NodeAddress,

    /// Receiving node
    pub destination: NodeAddress,

    /// Whether the step succeeded
    pub success: bool,
}

impl StatsRecord {
    pub fn new(
        kind: MessageKind,
        size: usize,
        source: NodeAddress,
        destination: NodeAddress,
        success: bool,
    ) -> Self {
        Self {
            kind,
            size,
            source,
            destination,
            success,
        }
    }

    /// CSV row without the timestamp column
    pub fn csv_fields(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.kind,
            self.size,
            self.source,
            self.destination,
            u8::from(self.success)
        )
    }
}

/// Receiver of telemetry produced by the coordinator
///
/// Called with the session lock held: implementations must not block on
/// I/O and must not call back into the coordinator. Sinks that touch files
/// or the terminal queue the work for another thread or task.
pub trait EventSink: Send + Sync {
    /// Record a statistics entry
    fn record(&self, stats: &StatsRecord);

    /// Hand an INFO payload from `source` to the application
    fn deliver(&self, _source: NodeAddress, _payload: &str) {}
}

/// Sink that turns every event into a `tracing` event
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, stats: &StatsRecord) {
        info!(
            kind = %stats.kind,
            size = stats.size,
            source = stats.source,
            destination = stats.destination,
            success = stats.success,
            "stats"
        );
    }

    fn deliver(&self, source: NodeAddress, payload: &str) {
        info!(source, payload, "message received");
    }
}

/// Appends statistics rows to a CSV file
///
/// Rows are stamped when recorded and handed to a writer thread, so
/// `record` never waits on the disk. Dropping the sink flushes every queued
/// row before returning.
pub struct CsvStatsSink {
    path: PathBuf,
    rows: Option<mpsc::Sender<String>>,
    writer: Option<JoinHandle<()>>,
}

impl CsvStatsSink {
    /// Open (or create) the statistics file, writing the header when empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", STATS_CSV_HEADER)?;
            file.flush()?;
        }

        let (rows, queued) = mpsc::channel();
        let writer_path = path.clone();
        let writer = thread::Builder::new()
            .name("dacap-stats".to_string())
            .spawn(move || write_rows(file, &writer_path, queued))?;
        info!(path = %path.display(), "writing statistics");

        Ok(Self {
            path,
            rows: Some(rows),
            writer: Some(writer),
        })
    }

    /// File name used for a node connected through `host`
    pub fn file_name_for(host: &str) -> String {
        format!("stats_{}.csv", host)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_rows(mut file: File, path: &Path, queued: mpsc::Receiver<String>) {
    for row in queued {
        if let Err(e) = writeln!(file, "{}", row).and_then(|_| file.flush()) {
            warn!(path = %path.display(), error = %e, "failed to write stats row");
        }
    }
}

impl EventSink for CsvStatsSink {
    fn record(&self, stats: &StatsRecord) {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let row = format!("{},{}", timestamp, stats.csv_fields());
        if let Some(rows) = &self.rows {
            if rows.send(row).is_err() {
                warn!(path = %self.path.display(), "stats writer stopped, dropping row");
            }
        }
    }
}

impl Drop for CsvStatsSink {
    fn drop(&mut self) {
        // Closing the queue ends the writer once it has drained
        self.rows.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!(path = %self.path.display(), "stats writer panicked");
            }
        }
    }
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<StatsRecord>>,
    delivered: Mutex<Vec<(NodeAddress, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded statistics
    pub fn records(&self) -> Vec<StatsRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copy of the delivered payloads as `(source, payload)`
    pub fn delivered(&self) -> Vec<(NodeAddress, String)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for MemorySink {
    fn record(&self, stats: &StatsRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stats.clone());
    }

    fn deliver(&self, source: NodeAddress, payload: &str) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((source, payload.to_string()));
    }
}

/// Forwards every event to each inner sink in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn record(&self, stats: &StatsRecord) {
        for sink in &self.sinks {
            sink.record(stats);
        }
    }

    fn deliver(&self, source: NodeAddress, payload: &str) {
        for sink in &self.sinks {
            sink.deliver(source, payload);
        }
    }
}

//! dacap-client: DACAP node client for an acoustic modem link.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dacap_core::batch::{batch_messages, send_batch};
use dacap_core::clock::MonotonicClock;
use dacap_core::config::ClientConfig;
use dacap_core::console::{parse_command, Command};
use dacap_core::telemetry::{CsvStatsSink, EventSink, FanoutSink, StatsRecord, TracingSink};
use dacap_core::transport::{self, ChannelSink, OUTBOUND_QUEUE_CAPACITY};
use dacap_core::{Coordinator, NodeAddress};

/// DACAP client: RTS/CTS/INFO handshake over a modem TCP link
#[derive(Parser, Debug)]
#[command(name = "dacap-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Modem / emulator host; the last octet is the node address
    host: String,

    /// Modem / emulator port
    #[arg(default_value_t = dacap_core::DEFAULT_PORT)]
    port: u16,

    /// Node address, overriding the one derived from the host
    #[arg(short, long)]
    address: Option<NodeAddress>,

    /// Reply timeout in milliseconds
    #[arg(long, default_value_t = dacap_core::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Timeout check period in milliseconds
    #[arg(long, default_value_t = dacap_core::DEFAULT_TICK_INTERVAL_MS)]
    tick_ms: u64,

    /// Pause between batch messages in milliseconds
    #[arg(long, default_value_t = dacap_core::DEFAULT_BATCH_PAUSE_MS)]
    batch_pause_ms: u64,

    /// Directory for the statistics CSV (disabled when omitted)
    #[arg(long)]
    stats_dir: Option<PathBuf>,
}

/// Queues received messages for the console printer task
struct ConsoleSink {
    tx: mpsc::UnboundedSender<(NodeAddress, String)>,
}

impl EventSink for ConsoleSink {
    fn record(&self, _stats: &StatsRecord) {}

    fn deliver(&self, source: NodeAddress, payload: &str) {
        if self.tx.send((source, payload.to_string())).is_err() {
            warn!(source, "console printer stopped, message not shown");
        }
    }
}

async fn print_messages(mut rx: mpsc::UnboundedReceiver<(NodeAddress, String)>) {
    while let Some((source, payload)) = rx.recv().await {
        println!("Message from {}: {}", source, payload);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut builder = ClientConfig::builder(cli.host)
        .with_port(cli.port)
        .with_timeout_ms(cli.timeout_ms)
        .with_tick_interval_ms(cli.tick_ms)
        .with_batch_pause_ms(cli.batch_pause_ms);
    if let Some(address) = cli.address {
        builder = builder.with_node_address(address);
    }
    if let Some(dir) = cli.stats_dir {
        builder = builder.with_stats_dir(dir);
    }
    let config = builder.build()?;
    let my_address = config.node_address();
    println!("Client is active with node address {}!", my_address);

    let (console_tx, console_rx) = mpsc::unbounded_channel();
    let printer_task = tokio::spawn(print_messages(console_rx));
    let mut events = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(ConsoleSink { tx: console_tx }));
    if let Some(path) = config.stats_path() {
        let csv = CsvStatsSink::open(&path)
            .with_context(|| format!("failed to open stats file {}", path.display()))?;
        events = events.with(Arc::new(csv));
    }

    let (read_half, write_half) = transport::connect(config.host(), config.port(), my_address)
        .await
        .with_context(|| format!("connection to {}:{} failed", config.host(), config.port()))?;
    println!("Connected to server {}:{}", config.host(), config.port());

    let (sink, outbound) = ChannelSink::channel(OUTBOUND_QUEUE_CAPACITY);
    let coordinator = Arc::new(Coordinator::new(
        my_address,
        config.session_config(),
        Arc::new(sink),
        Arc::new(MonotonicClock::new()),
        Arc::new(events),
    ));

    let writer_task = tokio::spawn(transport::run_writer(write_half, outbound));
    let mut reader_task = tokio::spawn(transport::run_reader(read_half, coordinator.clone()));
    let ticker_task = tokio::spawn(transport::run_ticker(
        coordinator.clone(),
        config.tick_interval(),
    ));

    println!("Input format: message,<address> | msi,<address> | status | exit");
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = stdin.next_line() => line?,
            _ = &mut reader_task => {
                warn!("link closed, stopping");
                break;
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Exit) => {
                info!("received exit command");
                break;
            }
            Ok(Command::Status) => {
                let counters = coordinator.counters();
                println!(
                    "node={} state={} successes={} failures={}",
                    coordinator.my_address(),
                    coordinator.state(),
                    counters.success,
                    counters.failure
                );
            }
            Ok(Command::Send { message, destination }) => {
                println!("Sending message: {} to {}", message, destination);
                if let Err(e) = coordinator.start_send(destination, &message) {
                    eprintln!("{}", e);
                }
            }
            Ok(Command::Batch { destination }) => {
                let messages = batch_messages(config.batch_size());
                let report =
                    send_batch(&coordinator, destination, &messages, &config.batch_options())
                        .await;
                println!(
                    "Transmission completed: {} successes, {} failures",
                    report.outcome.success, report.outcome.failure
                );
            }
            Err(e) => eprintln!("{}", e),
        }
    }

    ticker_task.abort();
    reader_task.abort();
    drop(coordinator);
    writer_task.abort();
    printer_task.abort();

    println!("Disconnected from server");
    info!("disconnected from server");
    Ok(())
}

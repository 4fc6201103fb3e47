//! Transport module - byte-stream link to the acoustic modem
//!
//! The coordinator only sees a [`TransportSink`]. In the client the sink is a
//! bounded channel drained by a writer task, so a write from inside the
//! session's critical section never waits on the socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::contracts::NodeAddress;
use crate::coordinator::Coordinator;
use crate::errors::{DacapError, Result};

/// Default capacity of the outbound frame queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Destination for encoded frames
///
/// Called with the session lock held: implementations must not block and
/// must not call back into the coordinator.
pub trait TransportSink: Send + Sync {
    /// Queue `bytes` for the link
    ///
    /// # Errors
    /// `TransportFailure` when the link refuses the write
    fn write(&self, bytes: &[u8]) -> Result<()>;
}

/// Sink feeding a writer task through a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelSink {
    /// Create a sink and the receiving end for the writer task
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl TransportSink for ChannelSink {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        self.tx.try_send(bytes.to_vec()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                DacapError::TransportFailure("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                DacapError::TransportFailure("link closed".to_string())
            }
        })
    }
}

/// Line sent once after connecting so the modem emulator learns our address
pub fn init_line(my_address: NodeAddress) -> String {
    format!("INIT,{}\n", my_address)
}

/// Connect to the modem and announce our address
///
/// # Returns
/// Read and write halves of the established stream
pub async fn connect(
    host: &str,
    port: u16,
    my_address: NodeAddress,
) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
    let stream = TcpStream::connect((host, port)).await?;
    if let Err(e) = stream.set_nodelay(true) {
        warn!(error = %e, "failed to disable Nagle on modem link");
    }
    info!(host, port, "connected to modem");

    let (reader, mut writer) = stream.into_split();
    writer.write_all(init_line(my_address).as_bytes()).await?;
    debug!(my_address, "sent INIT");
    Ok((reader, writer))
}

/// Drain queued frames onto the link until the queue closes or a write fails
///
/// Returning drops the receiver, so later sink writes fail as
/// `TransportFailure`.
pub async fn run_writer<W>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            warn!(error = %e, "link write failed");
            return Err(e.into());
        }
        debug!(line = %String::from_utf8_lossy(&bytes).trim_end(), "sent");
    }
    Ok(())
}

/// Feed every inbound line to the coordinator until the peer closes the link
pub async fn run_reader<R>(reader: R, coordinator: Arc<Coordinator>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(%line, "received");
                coordinator.on_inbound_line(&line);
            }
            Ok(None) => {
                info!("server closed the connection");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "receive error");
                return Err(e.into());
            }
        }
    }
}

/// Run the periodic timeout check forever
pub async fn run_ticker(coordinator: Arc<Coordinator>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        coordinator.on_tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_line() {
        assert_eq!(init_line(3), "INIT,3\n");
    }

    #[tokio::test]
    async fn test_channel_sink_reports_full_and_closed() {
        let (sink, mut rx) = ChannelSink::channel(1);
        sink.write(b"one\n").unwrap();
        assert!(matches!(
            sink.write(b"two\n"),
            Err(DacapError::TransportFailure(_))
        ));
        assert_eq!(rx.recv().await.unwrap(), b"one\n".to_vec());

        drop(rx);
        assert!(matches!(
            sink.write(b"three\n"),
            Err(DacapError::TransportFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_writer_drains_queue() {
        let (sink, rx) = ChannelSink::channel(8);
        sink.write(b"AT*SENDIM,3,5,noack,RTS\n").unwrap();
        sink.write(b"AT*SENDIM,3,6,noack,CTS\n").unwrap();
        drop(sink);

        let mut out = Vec::new();
        run_writer(&mut out, rx).await.unwrap();
        assert_eq!(out, b"AT*SENDIM,3,5,noack,RTS\nAT*SENDIM,3,6,noack,CTS\n".to_vec());
    }
}

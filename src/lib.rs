//! DACAP Core - Distance-Aware Collision Avoidance Protocol client
//!
//! Implements the RTS / CTS / INFO / DELIVERED handshake used by nodes of an
//! underwater acoustic network. The acoustic modem is reached over a reliable
//! byte stream that accepts `AT*SENDIM` commands and reports `RECVIM` /
//! `DELIVERED` lines.
//!
//! # Layers
//! - [`transmitter`] / [`receiver`]: wire codec for outgoing and incoming lines
//! - [`session`]: per-node handshake state machine (pure, no I/O)
//! - [`coordinator`]: serializes every event into the state machine and owns
//!   the success / failure counters
//! - [`transport`], [`telemetry`], [`batch`], [`console`], [`config`]: the
//!   plumbing used by the `dacap-client` binary

pub mod errors;
pub mod contracts;
pub mod transmitter;
pub mod receiver;
pub mod session;
pub mod clock;
pub mod telemetry;
pub mod transport;
pub mod coordinator;
pub mod batch;
pub mod console;
pub mod config;

pub use contracts::{
    CounterSnapshot, Frame, MessageKind, NodeAddress, OutgoingFrame, PendingTransmission,
    SessionState,
};
pub use coordinator::Coordinator;
pub use errors::{DacapError, Result};
pub use session::{Session, SessionAction, SessionConfig};

/// Maximum number of comma-separated fields considered in an inbound line.
/// Extra fields are ignored.
pub const MAX_FIELDS: usize = 1024;

/// Maximum width in bytes of a single inbound field; longer fields are cut.
pub const MAX_FIELD_WIDTH: usize = 19;

/// Maximum length in bytes of an inbound INFO payload
pub const MAX_PAYLOAD_LEN: usize = 63;

/// Maximum length in bytes of an application message held for sending
pub const MAX_MESSAGE_LEN: usize = 19;

/// Capacity of the INFO payload buffer, terminator included.
///
/// `"INFO;" + data` is cut to `INFO_BUFFER_SIZE - 1` bytes, so at most 24
/// bytes of data make it onto the wire.
pub const INFO_BUFFER_SIZE: usize = 30;

/// Time to wait for CTS or DELIVERED before the attempt fails
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Period of the timeout check
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Pause between two messages of a batch
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 100;

/// Default modem / emulator TCP port
pub const DEFAULT_PORT: u16 = 9200;

/// Number of messages sent by the `msi` console command
pub const BATCH_MESSAGE_COUNT: usize = 10;

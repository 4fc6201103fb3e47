//! Error types for DACAP protocol operations
//!
//! None of these are fatal to a node: malformed lines are dropped, and every
//! other variant ends a single transmission attempt at most.

use std::fmt;
use std::io;

use crate::contracts::{MessageKind, NodeAddress, SessionState};

/// Result type alias for DACAP operations
pub type Result<T> = std::result::Result<T, DacapError>;

/// DACAP protocol error enumeration
///
/// Covers the failure modes of the handshake pipeline:
/// - Link lines that are not protocol frames
/// - Rejected send requests (bad destination, session busy)
/// - Attempt-level failures (transport refused a write, reply never came)
/// - Operator input and configuration problems
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DacapError {
    /// Inbound line is not a recognizable RECVIM / DELIVERED report
    MalformedFrame(String),

    /// Destination address must be a positive node id
    InvalidDestination(NodeAddress),

    /// A transmission is already outstanding; retry once the session is idle
    SessionBusy { state: SessionState },

    /// The transport sink refused a write
    TransportFailure(String),

    /// No matching reply arrived within the timeout
    Timeout {
        destination: NodeAddress,
        awaiting: MessageKind,
    },

    /// Console line could not be turned into a command
    InvalidCommand(String),

    /// I/O error on the link
    IoError(String),

    /// Invalid client configuration
    Config(String),
}

impl DacapError {
    /// Whether the error ends a transmission attempt (and is counted as a failure)
    pub fn is_attempt_failure(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::Timeout { .. })
    }
}

impl fmt::Display for DacapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame(msg) => write!(f, "Malformed frame: {}", msg),
            Self::InvalidDestination(dest) => write!(f, "Invalid dest address {}", dest),
            Self::SessionBusy { state } => write!(f, "Client busy, state={}", state),
            Self::TransportFailure(msg) => write!(f, "Transport failure: {}", msg),
            Self::Timeout { destination, awaiting } => {
                write!(f, "Timeout waiting for {} from {}", awaiting, destination)
            }
            Self::InvalidCommand(msg) => write!(f, "Invalid command: {}", msg),
            Self::IoError(msg) => write!(f, "I/O error: {}", msg),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for DacapError {}

/// Convert from io::Error to DacapError
impl From<io::Error> for DacapError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

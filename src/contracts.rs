//! Core data structures for the DACAP handshake
//!
//! Frames are immutable values produced by the receiver and consumed at once
//! by the session. `PendingTransmission` and `SessionState` are owned by the
//! session and only change through its event handlers.

use std::fmt;

use crate::transmitter::truncate_utf8;

/// Hydroacoustic node address as carried on the wire.
///
/// Signed because the link reports it as free text and lenient parsing can
/// yield any integer; only positive values are valid destinations.
pub type NodeAddress = i32;

/// Kind of handshake message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Request to send
    Rts,
    /// Clear to send
    Cts,
    /// Data payload
    Info,
    /// Link-layer delivery confirmation for our last INFO
    Delivered,
}

impl MessageKind {
    /// Wire / log name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rts => "RTS",
            Self::Cts => "CTS",
            Self::Info => "INFO",
            Self::Delivered => "DELIVERED",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded inbound protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sending node (0 if not applicable)
    pub source: NodeAddress,

    /// Addressed node
    pub destination: NodeAddress,

    /// Message kind
    pub kind: MessageKind,

    /// `"RTS"` / `"CTS"`, the INFO data, or empty for DELIVERED
    pub payload: String,
}

impl Frame {
    /// Create a frame from its parts
    pub fn new(
        source: NodeAddress,
        destination: NodeAddress,
        kind: MessageKind,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            kind,
            payload: payload.into(),
        }
    }
}

/// Encoded frame ready to be written to the link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    /// Kind of the encoded frame
    pub kind: MessageKind,

    /// Node the frame is addressed to
    pub destination: NodeAddress,

    /// Complete `AT*SENDIM` line, newline included
    pub line: String,

    /// Length of the payload text as announced in the line
    pub payload_len: usize,
}

impl OutgoingFrame {
    /// Raw bytes to hand to the transport
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }
}

/// The one in-flight send attempt initiated by this node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTransmission {
    /// Application text, at most [`crate::MAX_MESSAGE_LEN`] bytes
    pub message: String,

    /// Peer the handshake runs with
    pub destination: NodeAddress,

    /// Clock reading (ms) when the current wait started
    pub started_at_ms: u64,
}

impl PendingTransmission {
    /// Create a pending record; the message is cut to [`crate::MAX_MESSAGE_LEN`]
    pub fn new(message: &str, destination: NodeAddress, started_at_ms: u64) -> Self {
        Self {
            message: truncate_utf8(message, crate::MAX_MESSAGE_LEN).to_string(),
            destination,
            started_at_ms,
        }
    }

    /// Whether this is the reset (no transmission) value
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Milliseconds elapsed since the current wait started
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }
}

/// Transmit phase of the local node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing outstanding
    #[default]
    Idle,
    /// RTS sent, waiting for CTS from the destination
    SendingRts,
    /// INFO sent, waiting for DELIVERED for the destination
    SendingInfo,
}

impl SessionState {
    /// Reply the state is waiting for, if any
    pub fn awaiting(&self) -> Option<MessageKind> {
        match self {
            Self::Idle => None,
            Self::SendingRts => Some(MessageKind::Cts),
            Self::SendingInfo => Some(MessageKind::Delivered),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::SendingRts => "SENDING_RTS",
            Self::SendingInfo => "SENDING_INFO",
        })
    }
}

/// Process-lifetime transmission tallies. Monotonic.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    success: u64,
    failure: u64,
}

impl Counters {
    /// Count a concluded successful attempt
    pub fn record_success(&mut self) {
        self.success += 1;
    }

    /// Count a concluded failed attempt
    pub fn record_failure(&mut self) {
        self.failure += 1;
    }

    /// Read-only copy of the tallies
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            success: self.success,
            failure: self.failure,
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub success: u64,
    pub failure: u64,
}

impl CounterSnapshot {
    /// Counts accumulated since an earlier snapshot
    pub fn since(&self, earlier: &CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            success: self.success.saturating_sub(earlier.success),
            failure: self.failure.saturating_sub(earlier.failure),
        }
    }

    /// Total concluded attempts
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }
}

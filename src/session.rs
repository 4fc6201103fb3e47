//! Session module - the per-node DACAP handshake state machine
//!
//! ```text
//!            begin_send / RTS            CTS from dest / INFO
//!   ┌──────┐ ───────────────> ┌─────────────┐ ─────────────────> ┌──────────────┐
//!   │ IDLE │                  │ SENDING_RTS │                    │ SENDING_INFO │
//!   └──────┘ <─────────────── └─────────────┘                    └──────────────┘
//!      ^       timeout / transport failure                              │
//!      └────────────────────────────────────────────────────────────────┘
//!               DELIVERED for dest (success), timeout / transport failure
//! ```
//!
//! The session is pure: time comes in as a parameter and every event returns
//! at most one [`SessionAction`] for the caller to execute. Receiving (RTS in,
//! CTS out; INFO in) never touches the local send state, so a node can answer
//! a peer while its own handshake is in flight.

use crate::contracts::{
    CounterSnapshot, Counters, Frame, MessageKind, NodeAddress, OutgoingFrame,
    PendingTransmission, SessionState,
};
use crate::errors::{DacapError, Result};
use crate::transmitter::Transmitter;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long to wait for CTS, and then for DELIVERED
    pub timeout_ms: u64,
}

impl SessionConfig {
    /// Set the reply timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: crate::DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Outcome of a session event that the caller has to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write this frame to the link
    Send(OutgoingFrame),

    /// Hand an INFO payload from a peer to the application
    Deliver {
        source: NodeAddress,
        payload: String,
    },

    /// Our handshake with `destination` completed successfully
    Completed { destination: NodeAddress },

    /// Our handshake with `destination` expired waiting for `awaiting`
    TimedOut {
        destination: NodeAddress,
        awaiting: MessageKind,
    },
}

impl SessionAction {
    /// Frame to transmit, if this action emits one
    pub fn outgoing(&self) -> Option<&OutgoingFrame> {
        match self {
            Self::Send(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Handshake state machine for one node
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
    pending: PendingTransmission,
    counters: Counters,
    config: SessionConfig,
}

impl Session {
    /// Create an idle session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Current transmit phase
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current pending record (the reset value when idle)
    pub fn pending(&self) -> &PendingTransmission {
        &self.pending
    }

    /// Success / failure tallies
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Configured reply timeout
    pub fn timeout_ms(&self) -> u64 {
        self.config.timeout_ms
    }

    /// Count a send request refused before any handshake started
    ///
    /// State and the pending record are left as they are.
    pub fn record_rejected_send(&mut self) {
        self.counters.record_failure();
    }

    /// Start a new transmission
    ///
    /// # Arguments
    /// * `destination` - Peer to send to, must be positive
    /// * `message` - Application text, cut to [`crate::MAX_MESSAGE_LEN`] bytes
    /// * `now_ms` - Current clock reading
    ///
    /// # Returns
    /// The RTS frame to put on the link
    ///
    /// # Errors
    /// `InvalidDestination` or `SessionBusy`; neither changes any state.
    pub fn begin_send(
        &mut self,
        destination: NodeAddress,
        message: &str,
        now_ms: u64,
    ) -> Result<OutgoingFrame> {
        if destination <= 0 {
            return Err(DacapError::InvalidDestination(destination));
        }
        if self.state != SessionState::Idle {
            return Err(DacapError::SessionBusy { state: self.state });
        }

        let rts = Self::encode(destination, MessageKind::Rts, None)?;
        self.pending = PendingTransmission::new(message, destination, now_ms);
        self.state = SessionState::SendingRts;
        Ok(rts)
    }

    /// Feed a decoded inbound frame
    ///
    /// Frames addressed to another node are ignored (DELIVERED reports carry
    /// no remote audience and are always considered). Stale or mismatched
    /// CTS / DELIVERED frames are ignored as well.
    pub fn on_frame(
        &mut self,
        frame: &Frame,
        my_address: NodeAddress,
        now_ms: u64,
    ) -> Option<SessionAction> {
        if frame.kind != MessageKind::Delivered && frame.destination != my_address {
            return None;
        }

        match frame.kind {
            MessageKind::Rts => Self::encode(frame.source, MessageKind::Cts, None)
                .ok()
                .map(SessionAction::Send),

            MessageKind::Cts => {
                if self.state != SessionState::SendingRts
                    || frame.source != self.pending.destination
                {
                    return None;
                }
                let info = Self::encode(
                    self.pending.destination,
                    MessageKind::Info,
                    Some(&self.pending.message),
                )
                .ok()?;
                self.state = SessionState::SendingInfo;
                self.pending.started_at_ms = now_ms;
                Some(SessionAction::Send(info))
            }

            MessageKind::Info => Some(SessionAction::Deliver {
                source: frame.source,
                payload: frame.payload.clone(),
            }),

            MessageKind::Delivered => {
                if self.state != SessionState::SendingInfo
                    || frame.destination != self.pending.destination
                {
                    return None;
                }
                let destination = self.pending.destination;
                self.counters.record_success();
                self.reset();
                Some(SessionAction::Completed { destination })
            }
        }
    }

    /// Expire the outstanding handshake once its wait exceeds the timeout
    pub fn tick(&mut self, now_ms: u64) -> Option<SessionAction> {
        let awaiting = self.state.awaiting()?;
        if self.pending.elapsed_ms(now_ms) <= self.config.timeout_ms {
            return None;
        }

        let destination = self.pending.destination;
        self.counters.record_failure();
        self.reset();
        Some(SessionAction::TimedOut {
            destination,
            awaiting,
        })
    }

    /// Account for a frame the transport refused to take
    ///
    /// Always counts one failure. RTS and INFO belong to our own handshake,
    /// which cannot continue, so the session returns to idle; a refused CTS
    /// reply leaves the local send state alone.
    pub fn on_transport_failure(&mut self, kind: MessageKind) {
        self.counters.record_failure();
        let ours = match kind {
            MessageKind::Rts => self.state == SessionState::SendingRts,
            MessageKind::Info => self.state == SessionState::SendingInfo,
            MessageKind::Cts | MessageKind::Delivered => false,
        };
        if ours {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.pending = PendingTransmission::default();
    }

    fn encode(
        destination: NodeAddress,
        kind: MessageKind,
        data: Option<&str>,
    ) -> Result<OutgoingFrame> {
        Transmitter::encode_frame(destination, kind, data).ok_or_else(|| {
            DacapError::TransportFailure(format!("{} frames are not sendable", kind))
        })
    }
}

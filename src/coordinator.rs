//! Coordinator module - the single entry point into a node's session
//!
//! Senders (console, batch) call [`Coordinator::start_send`]; the link reader
//! calls [`Coordinator::on_inbound_line`]; a timer calls
//! [`Coordinator::on_tick`]. Session state, the pending record and the
//! counters live behind one mutex, and each call runs decide-mutate-transmit
//! as one critical section, so a CTS and a timeout can never interleave.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::contracts::{
    CounterSnapshot, MessageKind, NodeAddress, OutgoingFrame, PendingTransmission, SessionState,
};
use crate::errors::{DacapError, Result};
use crate::receiver::Receiver;
use crate::session::{Session, SessionAction, SessionConfig};
use crate::telemetry::{EventSink, StatsRecord};
use crate::transport::TransportSink;

/// Serialized access to one node's handshake state
pub struct Coordinator {
    my_address: NodeAddress,
    session: Mutex<Session>,
    transport: Arc<dyn TransportSink>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl Coordinator {
    /// Create a coordinator for node `my_address`
    ///
    /// # Arguments
    /// * `my_address` - Our hydroacoustic address
    /// * `config` - Session timing
    /// * `transport` - Where encoded frames are written
    /// * `clock` - Monotonic time source
    /// * `events` - Statistics / delivery sink
    pub fn new(
        my_address: NodeAddress,
        config: SessionConfig,
        transport: Arc<dyn TransportSink>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            my_address,
            session: Mutex::new(Session::new(config)),
            transport,
            clock,
            events,
        }
    }

    /// Our node address
    pub fn my_address(&self) -> NodeAddress {
        self.my_address
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // Every critical section leaves the session consistent, so a panic
        // elsewhere cannot leave a half-applied transition behind.
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start sending `message` to `destination`
    ///
    /// # Errors
    /// - `InvalidDestination`: request rejected and counted as one failure;
    ///   state and pending record are untouched
    /// - `SessionBusy`: request rejected, nothing changed
    /// - `TransportFailure`: the RTS could not be written; the attempt is
    ///   counted as failed and the session is idle again
    pub fn start_send(&self, destination: NodeAddress, message: &str) -> Result<()> {
        let mut session = self.lock();
        let now = self.clock.now_ms();
        debug!(my_address = self.my_address, destination, text = message, "send requested");

        let rts = match session.begin_send(destination, message, now) {
            Ok(rts) => rts,
            Err(e @ DacapError::InvalidDestination(_)) => {
                warn!(destination, "{}", e);
                session.record_rejected_send();
                self.events.record(&StatsRecord::new(
                    MessageKind::Rts,
                    3,
                    self.my_address,
                    destination,
                    false,
                ));
                return Err(e);
            }
            Err(e) => {
                info!("{}", e);
                return Err(e);
            }
        };

        self.transmit(&mut session, &rts)?;
        info!(destination, "sent RTS");
        Ok(())
    }

    /// Decode and handle one line from the link
    ///
    /// Malformed lines are logged and dropped. Returns the action the
    /// session took, if any, for callers that want to observe it.
    pub fn on_inbound_line(&self, line: &str) -> Option<SessionAction> {
        let frame = match Receiver::decode(line) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "dropping line");
                return None;
            }
        };

        let mut session = self.lock();
        let now = self.clock.now_ms();
        debug!(
            kind = %frame.kind,
            source = frame.source,
            destination = frame.destination,
            "handling frame"
        );

        let action = session.on_frame(&frame, self.my_address, now);
        match &action {
            None => {
                if frame.kind != MessageKind::Delivered && frame.destination != self.my_address {
                    debug!(destination = frame.destination, "frame for another node, ignoring");
                } else {
                    debug!(kind = %frame.kind, source = frame.source, "stale frame, ignoring");
                }
            }
            Some(SessionAction::Send(outgoing)) => {
                // Failure is already counted and logged by transmit
                let _ = self.transmit(&mut session, outgoing);
            }
            Some(SessionAction::Deliver { source, payload }) => {
                info!(source, payload = %payload, "INFO received");
                self.events.deliver(*source, payload);
                self.events.record(&StatsRecord::new(
                    MessageKind::Info,
                    payload.len(),
                    *source,
                    self.my_address,
                    true,
                ));
            }
            Some(SessionAction::Completed { destination }) => {
                info!(destination, "message sent successfully");
                self.events.record(&StatsRecord::new(
                    MessageKind::Delivered,
                    0,
                    self.my_address,
                    *destination,
                    true,
                ));
            }
            Some(SessionAction::TimedOut { .. }) => {}
        }
        action
    }

    /// Expire the outstanding handshake if its reply is overdue
    ///
    /// The current time is read from the coordinator's [`Clock`].
    pub fn on_tick(&self) -> Option<SessionAction> {
        let mut session = self.lock();
        let action = session.tick(self.clock.now_ms());
        if let Some(SessionAction::TimedOut { destination, awaiting }) = &action {
            warn!(
                "{}",
                DacapError::Timeout {
                    destination: *destination,
                    awaiting: *awaiting,
                }
            );
            self.events.record(&StatsRecord::new(
                *awaiting,
                0,
                self.my_address,
                *destination,
                false,
            ));
        }
        action
    }

    /// Snapshot of the success / failure counters
    pub fn counters(&self) -> CounterSnapshot {
        self.lock().counters()
    }

    /// Current transmit phase
    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    /// Copy of the pending record
    pub fn pending(&self) -> PendingTransmission {
        self.lock().pending().clone()
    }

    /// State and pending record read under one lock
    pub fn snapshot(&self) -> (SessionState, PendingTransmission) {
        let session = self.lock();
        (session.state(), session.pending().clone())
    }

    /// Whether no transmission is outstanding
    pub fn is_idle(&self) -> bool {
        self.state() == SessionState::Idle
    }

    /// Write a frame while holding the session lock
    fn transmit(&self, session: &mut Session, frame: &OutgoingFrame) -> Result<()> {
        let result = self.transport.write(frame.as_bytes());
        let success = result.is_ok();
        self.events.record(&StatsRecord::new(
            frame.kind,
            frame.payload_len,
            self.my_address,
            frame.destination,
            success,
        ));

        match result {
            Ok(()) => {
                debug!(kind = %frame.kind, destination = frame.destination, "frame queued");
                Ok(())
            }
            Err(e) => {
                warn!(kind = %frame.kind, destination = frame.destination, error = %e, "failed to send");
                session.on_transport_failure(frame.kind);
                Err(e)
            }
        }
    }
}

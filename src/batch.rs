//! Batch sending on top of the coordinator
//!
//! Only one transmission may be outstanding, so a batch waits for the
//! session to return to idle before issuing the next message.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::contracts::{CounterSnapshot, NodeAddress};
use crate::coordinator::Coordinator;
use crate::errors::DacapError;

/// Batch pacing
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// How often to check whether the session went idle
    pub poll_interval: Duration,

    /// Pause after each message before starting the next one
    pub pause: Duration,
}

impl BatchOptions {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::DEFAULT_TICK_INTERVAL_MS),
            pause: Duration::from_millis(crate::DEFAULT_BATCH_PAUSE_MS),
        }
    }
}

/// Result of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Messages for which a handshake was started (or refused by the link)
    pub attempted: usize,

    /// Messages rejected before any handshake started
    pub rejected: usize,

    /// Counter changes over the batch
    pub outcome: CounterSnapshot,
}

/// The canned batch: `"Message 0"` .. `"Message {count - 1}"`
pub fn batch_messages(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Message {}", i)).collect()
}

/// Send every message to `destination`, one handshake at a time
///
/// Each poll also runs the timeout check, so a batch finishes even when no
/// separate ticker is running. Counter deltas include any concurrent
/// activity on the same coordinator.
pub async fn send_batch(
    coordinator: &Coordinator,
    destination: NodeAddress,
    messages: &[String],
    options: &BatchOptions,
) -> BatchReport {
    let before = coordinator.counters();
    let mut attempted = 0;
    let mut rejected = 0;

    for (index, message) in messages.iter().enumerate() {
        info!(index, text = %message, destination, "sending batch message");

        loop {
            match coordinator.start_send(destination, message) {
                Ok(()) | Err(DacapError::TransportFailure(_)) => {
                    attempted += 1;
                    break;
                }
                Err(DacapError::SessionBusy { .. }) => {
                    // Someone else's handshake is in flight; retry once it ends
                    wait_idle(coordinator, options.poll_interval).await;
                }
                Err(e) => {
                    warn!(index, error = %e, "batch message rejected");
                    rejected += 1;
                    break;
                }
            }
        }

        wait_idle(coordinator, options.poll_interval).await;
        sleep(options.pause).await;
    }

    let outcome = coordinator.counters().since(&before);
    info!(
        "Transmission completed: {} successes, {} failures",
        outcome.success, outcome.failure
    );
    BatchReport {
        attempted,
        rejected,
        outcome,
    }
}

async fn wait_idle(coordinator: &Coordinator, poll_interval: Duration) {
    loop {
        coordinator.on_tick();
        if coordinator.is_idle() {
            return;
        }
        sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_messages() {
        let messages = batch_messages(crate::BATCH_MESSAGE_COUNT);
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0], "Message 0");
        assert_eq!(messages[9], "Message 9");
    }

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert_eq!(options.poll_interval, Duration::from_millis(10));
        assert_eq!(options.pause, Duration::from_millis(100));

        let options = options.with_pause(Duration::ZERO);
        assert_eq!(options.pause, Duration::ZERO);
    }
}

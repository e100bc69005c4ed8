//! Echo suppression for the store's own durable writes
//!
//! Storage watches report every write to the compare key, including the
//! ones this tab just made. The guard remembers recently written payloads;
//! a notification carrying one of them is the echo of our own write.
//! Matching is by content, and a remembered payload only counts within the
//! echo window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::trace;

/// Default echo window in milliseconds
pub const DEFAULT_ECHO_WINDOW_MS: u64 = 500;

/// Upper bound on remembered writes
const MAX_PENDING: usize = 32;

#[derive(Debug)]
struct PendingWrite {
    payload: String,
    written_at: Instant,
}

/// Tracks payloads written by this tab until their echo comes back
#[derive(Debug)]
pub struct EchoGuard {
    window: Duration,
    pending: VecDeque<PendingWrite>,
}

impl EchoGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: VecDeque::new(),
        }
    }

    /// Remember a payload this tab has just written
    pub fn record_write(&mut self, payload: impl Into<String>) {
        self.prune();
        if self.pending.len() == MAX_PENDING {
            self.pending.pop_front();
        }
        self.pending.push_back(PendingWrite {
            payload: payload.into(),
            written_at: Instant::now(),
        });
    }

    /// Whether a notification payload (`None` for a removed key) is the
    /// echo of one of our writes
    ///
    /// A matched echo is consumed together with every older pending write,
    /// so a later identical write from another tab is not mistaken for it.
    pub fn is_echo(&mut self, payload: Option<&str>) -> bool {
        self.prune();

        let Some(payload) = payload else {
            return false;
        };
        let Some(idx) = self.pending.iter().position(|p| p.payload == payload) else {
            return false;
        };

        if let Some(write) = self.pending.drain(..=idx).last() {
            trace!(
                elapsed_ms = write.written_at.elapsed().as_millis() as u64,
                "Echo of own write"
            );
        }
        true
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.pending.len()
    }

    fn prune(&mut self) {
        let window = self.window;
        while let Some(front) = self.pending.front() {
            if front.written_at.elapsed() < window {
                break;
            }
            self.pending.pop_front();
        }
    }
}

impl Default for EchoGuard {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_ECHO_WINDOW_MS))
    }
}

//! Fixed-interval reconnection policy.
//!
//! After a transport closure or failed connect the session waits one
//! interval and tries again, indefinitely. There is no backoff and no
//! attempt ceiling.

use std::time::Duration;

/// Tracks reconnection attempts and yields the delay before the next one.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    interval: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Retry every `interval`.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            attempts: 0,
        }
    }

    /// Delay before the next attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        self.interval
    }

    /// Called once a connection opens.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

//! Retry backoff for transport errors.
//!
//! The watch loop polls at a fixed interval while the cluster answers.
//! Each consecutive transport failure doubles the wait up to a ceiling; the
//! first successful fetch resets it.

use std::time::Duration;

use tracing::debug;

/// Tracks consecutive transport failures for one watcher.
#[derive(Debug)]
pub struct RetryBackoff {
    /// Consecutive failure count.
    consecutive_failures: u32,
    /// Current wait before the next attempt.
    current: Duration,
    /// Wait used while the cluster is healthy.
    base_interval: Duration,
    /// Maximum wait.
    max_backoff: Duration,
}

impl RetryBackoff {
    pub fn new(base_interval: Duration, max_backoff: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            current: base_interval,
            base_interval,
            max_backoff: max_backoff.max(base_interval),
        }
    }

    /// Record a successful fetch.
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            debug!(failures = self.consecutive_failures, "cluster reachable again");
        }
        self.consecutive_failures = 0;
        self.current = self.base_interval;
    }

    /// Record a transport failure and return the consecutive failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.consecutive_failures += 1;
        self.current = self.current.saturating_mul(2).min(self.max_backoff);
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Wait before the next attempt.
    pub fn next_interval(&self) -> Duration {
        self.current
    }
}

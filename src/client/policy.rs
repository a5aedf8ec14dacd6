//! Reconnect timing policy

use std::time::Duration;

/// Exponential backoff with a ceiling
///
/// The delay before reconnect attempt `n` (zero-based) is
/// `min(base_delay * 2^n, max_delay)`. The policy is a pure value; it
/// never sleeps or reads a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Ceiling applied to every computed delay
    pub max_delay: Duration,
    /// Retries before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }
}

//! Reconnect state machine
//!
//! The controller decides WHEN to retry; the socket worker owns the
//! actual timer. Keeping the clock out of the controller makes every
//! transition testable by calling the methods directly.

use std::time::Duration;

use crate::client::policy::ReconnectPolicy;

/// Lifecycle of the reconnect loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// No connection in flight and nothing scheduled
    Idle,
    /// A connection attempt is running
    Connecting,
    /// Waiting out a delay before the next attempt
    Backoff,
    /// Retry budget exhausted; the loop is done
    Failed,
}

impl ReconnectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconnectState::Idle => "idle",
            ReconnectState::Connecting => "connecting",
            ReconnectState::Backoff => "backoff",
            ReconnectState::Failed => "failed",
        }
    }
}

/// What the socket worker should do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Sleep this long, then attempt again
    RetryAfter(Duration),
    /// Give up; do not reconnect
    Stop,
}

/// Drives reconnect decisions for one client
///
/// The failure counter resets only when a session reaches ready, so a
/// flapping link pays progressively longer delays until it holds.
#[derive(Debug)]
pub struct ReconnectController {
    policy: ReconnectPolicy,
    state: ReconnectState,
    failures: u32,
}

impl ReconnectController {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ReconnectState::Idle,
            failures: 0,
        }
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Consecutive failures since the last ready session
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// A connection attempt is starting
    pub fn on_attempt(&mut self) {
        self.state = ReconnectState::Connecting;
    }

    /// The session reached ready; the failure streak is over
    pub fn on_ready(&mut self) {
        self.state = ReconnectState::Idle;
        self.failures = 0;
    }

    /// The attempt (or an established session) died
    ///
    /// Returns the delay before the next attempt, or `Stop` once the
    /// retry budget is spent. The delay for failure `n` is computed
    /// before the counter advances, so the sequence starts at
    /// `base_delay` and doubles from there.
    pub fn on_failure(&mut self) -> NextStep {
        if self.failures >= self.policy.max_attempts {
            self.state = ReconnectState::Failed;
            return NextStep::Stop;
        }
        let delay = self.policy.delay_for(self.failures);
        self.failures += 1;
        self.state = ReconnectState::Backoff;
        NextStep::RetryAfter(delay)
    }

    /// The user asked for the disconnect; no retry follows
    pub fn on_clean_close(&mut self) {
        self.state = ReconnectState::Idle;
    }
}

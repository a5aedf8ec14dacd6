//! Error taxonomy for publish and dispatch
//!
//! Publish-boundary failures surface as `PublishError` and reach the
//! caller. Handler failures during fan-out never do: they are captured into
//! the `DispatchReport`, logged in bulk, and mirrored onto the hub error
//! side-channel, so one failing subscriber can never starve the others.

use thiserror::Error;

/// Errors surfaced by the publish boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Envelope failed validation (empty type or source)
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Derived event would exceed the propagation depth ceiling
    #[error("propagation limit exceeded: depth {depth} > max {max} for '{event_type}'")]
    PropagationLimitExceeded {
        event_type: String,
        depth: u32,
        max: u32,
    },

    /// Causing event forbids derived publishes
    #[error("propagation disabled by causing event {cause_id} ({cause_type})")]
    PropagationDisabled {
        cause_id: String,
        cause_type: String,
    },
}

impl PublishError {
    /// Create an invalid-event error
    pub fn invalid(message: impl Into<String>) -> Self {
        PublishError::InvalidEvent(message.into())
    }
}

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// An error returned (or a panic captured) from one subscriber's handler
///
/// Dispatch collects these instead of raising them; they are observable via
/// the report, the logs, and `hub.error.handler` events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Create a handler error with a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<PublishError> for HandlerError {
    fn from(e: PublishError) -> Self {
        Self::msg(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::msg(format!("payload error: {}", e))
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

/// One captured handler failure within a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Diagnostic label of the failing subscription
    pub subscriber_id: String,
    /// The captured error
    pub error: HandlerError,
}

/// Outcome of one publish fan-out
///
/// `matched` counts subscriptions resolved for the event type; `delivered`
/// counts handlers that ran cleanly or channel sends that succeeded;
/// `failed` counts captured errors, panics, and dead channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    /// Whether every matched handler was delivered to cleanly
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

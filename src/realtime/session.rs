//! Connection session lifecycle
//!
//! Every socket walks `connecting -> open -> authenticating -> ready ->
//! closing -> closed`. An `error` sub-state is reachable from every live
//! state and always terminates in `closed`, so cleanup runs exactly once
//! no matter how a connection dies.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use super::errors::{RealtimeError, RealtimeResult};
use super::UserId;

/// Lifecycle states of one socket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// TCP accepted, WebSocket handshake in progress
    Connecting,
    /// Handshake complete, credential not yet checked
    Open,
    /// Verifying the handshake token
    Authenticating,
    /// Authenticated and exchanging frames
    Ready,
    /// Close initiated, waiting for teardown
    Closing,
    /// Fully torn down
    Closed,
    /// Failed; next stop is closed
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        }
    }

    /// Whether this state permits a transition to `next`
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Open)
                | (Open, Authenticating)
                | (Open, Closing)
                | (Authenticating, Ready)
                | (Authenticating, Closing)
                | (Ready, Closing)
                | (Closing, Closed)
                | (Connecting, Error)
                | (Open, Error)
                | (Authenticating, Error)
                | (Ready, Error)
                | (Closing, Error)
                | (Error, Closed)
        )
    }

    /// Closed is the only terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of one live socket connection
#[derive(Debug)]
pub struct Session {
    /// Unique per physical socket
    pub connection_id: String,
    /// Bound after successful authentication
    pub user_id: Option<UserId>,
    state: SessionState,
    pub connected_at: DateTime<Utc>,
    last_activity: Instant,
}

impl Session {
    pub fn new(connection_id: String) -> Self {
        Self {
            connection_id,
            user_id: None,
            state: SessionState::Connecting,
            connected_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, next: SessionState) -> RealtimeResult<()> {
        if !self.state.can_transition(next) {
            return Err(RealtimeError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        self.state = next;
        Ok(())
    }

    /// Bind the authenticated user
    pub fn bind_user(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }

    /// Record inbound activity for idle detection
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last inbound activity
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.elapsed()
    }
}

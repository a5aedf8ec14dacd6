//! Realtime layer errors

use thiserror::Error;

/// Result type for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Realtime errors
#[derive(Debug, Clone, Error)]
pub enum RealtimeError {
    // ==================
    // Connection Errors
    // ==================
    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// No activity within the heartbeat window
    #[error("Idle timeout")]
    IdleTimeout,

    /// Frame could not be parsed or is not a supported type
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    // ==================
    // Authentication Errors
    // ==================
    /// Handshake carried no credential token
    #[error("Missing credential token")]
    MissingToken,

    /// Token was present but rejected
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // ==================
    // Session Errors
    // ==================
    /// Disallowed session state transition
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    // ==================
    // Internal Errors
    // ==================
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl RealtimeError {
    /// Returns the close code sent when this error terminates a connection
    pub fn close_code(&self) -> u16 {
        match self {
            RealtimeError::ConnectionClosed => 1000,
            RealtimeError::InvalidFrame(_) => 1003,
            RealtimeError::MissingToken => 4001,
            RealtimeError::AuthFailed(_) => 4003,
            RealtimeError::IdleTimeout => 4008,
            RealtimeError::InvalidTransition { .. } => 4500,
            RealtimeError::Internal(_) => 4500,
            RealtimeError::ConfigError(_) => 4501,
            RealtimeError::ConnectionError(_) => 4502,
        }
    }
}

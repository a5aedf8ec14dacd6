//! CLI-specific error types
//!
//! Every CLI error is fatal; main prints it and exits non-zero.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Boot failed
    BootFailed,
    /// Serving loop failed
    ServeFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "PLEXUS_CLI_CONFIG_ERROR",
            Self::BootFailed => "PLEXUS_CLI_BOOT_FAILED",
            Self::ServeFailed => "PLEXUS_CLI_SERVE_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Serving loop failed
    pub fn serve_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ServeFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::serve_failed(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            CliError::config_error("bad").code_str(),
            "PLEXUS_CLI_CONFIG_ERROR"
        );
        assert_eq!(
            CliError::boot_failed("no runtime").code_str(),
            "PLEXUS_CLI_BOOT_FAILED"
        );
        assert_eq!(
            CliError::serve_failed("bind").code_str(),
            "PLEXUS_CLI_SERVE_FAILED"
        );
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = CliError::config_error("missing field");
        assert_eq!(err.to_string(), "PLEXUS_CLI_CONFIG_ERROR: missing field");
    }
}

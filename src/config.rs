//! Configuration file loading
//!
//! One JSON file (`plexus.json`) configures every subsystem. Absent
//! fields take their defaults, and an absent file means an all-default
//! config, so a bare `plexus start` works without any setup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::HttpApiConfig;
use crate::hub::HubConfig;
use crate::observability::LifecycleEvent;
use crate::realtime::RealtimeConfig;

/// Default config file path
pub const DEFAULT_CONFIG_PATH: &str = "./plexus.json";

/// Config file read, parse, or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Auth settings for the realtime handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    #[serde(default = "default_secret")]
    pub secret: String,
}

fn default_secret() -> String {
    "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Event hub settings
    #[serde(default)]
    pub hub: HubConfig,

    /// WebSocket server settings
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// HTTP introspection settings
    #[serde(default)]
    pub http: HttpApiConfig,

    /// Token verification settings
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load from file, or fall back to defaults when the file is absent
    ///
    /// A file that exists but fails to read, parse, or validate is still
    /// an error; only a missing file falls through.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            LifecycleEvent::ConfigDefaulted.emit(&[("path", &path.display().to_string())]);
            return Ok(Self::default());
        }

        let config = Self::load(path)?;
        LifecycleEvent::ConfigLoaded.emit(&[("path", &path.display().to_string())]);
        Ok(config)
    }

    /// Validate field constraints
    fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "hub.history_capacity must be > 0".to_string(),
            ));
        }

        if self.hub.max_propagation_depth == 0 {
            return Err(ConfigError::Invalid(
                "hub.max_propagation_depth must be > 0".to_string(),
            ));
        }

        if self.realtime.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "realtime.heartbeat_interval_secs must be > 0".to_string(),
            ));
        }

        if self.realtime.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid(
                "realtime.max_frame_bytes must be > 0".to_string(),
            ));
        }

        if self.auth.secret.is_empty() {
            return Err(ConfigError::Invalid(
                "auth.secret must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hub.max_propagation_depth, 5);
        assert_eq!(config.hub.history_capacity, 1000);
        assert_eq!(config.realtime.bind_addr, "0.0.0.0:4000");
        assert_eq!(config.realtime.heartbeat_interval_secs, 30);
        assert_eq!(config.realtime.max_frame_bytes, 65536);
        assert!(!config.auth.secret.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plexus.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(br#"{"hub": {"max_propagation_depth": 3}}"#)
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.hub.max_propagation_depth, 3);
        assert_eq!(config.hub.history_capacity, 1000);
        assert_eq!(config.realtime.bind_addr, "0.0.0.0:4000");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.hub.history_capacity, 1000);
    }

    #[test]
    fn test_invalid_json_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plexus.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"{not json").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plexus.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(br#"{"hub": {"history_capacity": 0}}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plexus.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(br#"{"auth": {"secret": ""}}"#).unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }
}

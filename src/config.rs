//! Configuration management for Auriga
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{AurigaError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Charge-point control API configuration
    pub api: ApiConfig,

    /// Telemetry polling and retry configuration
    pub polling: PollingConfig,

    /// Session snapshot persistence configuration
    pub persistence: PersistenceConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Charge-point control API connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the control API, e.g. `https://csms.example.com/public-api/`
    pub base_url: String,

    /// Bearer token for API authentication
    pub access_token: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Whether any 2xx response to a start request counts as accepted.
    /// When false only 202 Accepted does.
    #[serde(default)]
    pub accept_any_2xx: bool,
}

/// Telemetry polling and retry parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between telemetry polls while a session is active, in seconds
    pub interval_secs: u64,

    /// Delay before re-querying after the session was not found, in seconds
    pub retry_backoff_secs: u64,

    /// Consecutive not-found polls tolerated before giving up
    pub max_retries: u32,
}

impl PollingConfig {
    /// Poll interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Retry backoff as a [`Duration`]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// Session snapshot persistence parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the JSON file holding persisted session records
    pub file: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file
    pub file: String,

    /// Number of rotated log files to keep
    pub backup_count: u32,

    /// Whether to log to console
    #[serde(default = "default_true")]
    pub console_output: bool,

    /// Whether to use JSON format
    #[serde(default)]
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.charge.example.com/public-api/".to_string(),
            access_token: String::new(),
            request_timeout_secs: 30,
            accept_any_2xx: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            retry_backoff_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            file: "/data/auriga_sessions.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/auriga.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8098,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations, or from the path
    /// named by `AURIGA_CONFIG` when set
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("AURIGA_CONFIG")
            && !path.is_empty()
        {
            return Self::from_file(path);
        }

        let default_paths = [
            "auriga_config.yaml",
            "/data/auriga_config.yaml",
            "/etc/auriga/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.is_empty() {
            return Err(AurigaError::validation(
                "api.base_url",
                "Base URL cannot be empty",
            ));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(AurigaError::validation(
                "api.base_url",
                "Base URL must be an http(s) URL",
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(AurigaError::validation(
                "api.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.polling.interval_secs == 0 {
            return Err(AurigaError::validation(
                "polling.interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.polling.retry_backoff_secs == 0 {
            return Err(AurigaError::validation(
                "polling.retry_backoff_secs",
                "Must be greater than 0",
            ));
        }

        if self.polling.max_retries == 0 {
            return Err(AurigaError::validation(
                "polling.max_retries",
                "Must be greater than 0",
            ));
        }

        if self.persistence.file.is_empty() {
            return Err(AurigaError::validation(
                "persistence.file",
                "File path cannot be empty",
            ));
        }

        if self.web.port == 0 {
            return Err(AurigaError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BagwatchError, Result};
use crate::payload::protocol::QR_MAX_BYTES_ECC_HIGH;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub payload: PayloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend service configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Fetch cycle configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollingConfig {
    #[serde(default = "default_snapshot_interval_s")]
    pub snapshot_interval_s: u64,

    #[serde(default = "default_history_interval_s")]
    pub history_interval_s: u64,
}

/// QR payload configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PayloadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to stdout only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_base_url() -> String { "http://localhost:8000".to_string() }
fn default_request_timeout_ms() -> u64 { 5000 }

fn default_snapshot_interval_s() -> u64 { 15 }
fn default_history_interval_s() -> u64 { 15 }

fn default_max_bytes() -> usize { 300 }

fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            polling: PollingConfig::default(),
            payload: PayloadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_s: default_snapshot_interval_s(),
            history_interval_s: default_history_interval_s(),
        }
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self { max_bytes: default_max_bytes() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl PollingConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_s)
    }

    pub fn history_interval(&self) -> Duration {
        Duration::from_secs(self.history_interval_s)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bagwatch::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate backend configuration
        let base_url = self.backend.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("backend base_url cannot be empty"));
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(invalid("backend base_url must start with http:// or https://"));
        }

        if self.backend.request_timeout_ms == 0 || self.backend.request_timeout_ms > 60000 {
            return Err(invalid("request_timeout_ms must be between 1 and 60000"));
        }

        // Validate polling intervals
        for (name, value) in [
            ("snapshot_interval_s", self.polling.snapshot_interval_s),
            ("history_interval_s", self.polling.history_interval_s),
        ] {
            if value == 0 || value > 3600 {
                return Err(invalid(format!("{} must be between 1 and 3600", name)));
            }
        }

        // Validate payload budget
        if self.payload.max_bytes < 64 || self.payload.max_bytes > QR_MAX_BYTES_ECC_HIGH {
            return Err(invalid(format!(
                "payload max_bytes must be between 64 and {}",
                QR_MAX_BYTES_ECC_HIGH
            )));
        }

        // Validate log level
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> BagwatchError {
    BagwatchError::Config(toml::de::Error::custom(msg))
}

//! Plugin configuration
//!
//! Hosts pass the configuration as JSON at init time. With the `config-file`
//! feature it can also be read from a file and `LAIRD_*` environment
//! variables (after loading `.env`).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plugin::DEFAULT_REGISTRATION_NAME;

/// Default discovery timeout, after which the scan stops on its own
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 30_000;

/// Default interval between radio scan restarts in periodic discovery
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 1_000;

/// Default maximum bytes per radio write
pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Name the host runtime uses to look up the plugin
    pub registration_name: String,
    /// Bind the web fallback when no native implementation is registered
    pub allow_web_fallback: bool,
    pub scan_timeout_ms: u64,
    pub scan_interval_ms: u64,
    pub write_chunk_size: usize,
    pub enable_logging: bool,
    pub log_level: Option<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            registration_name: DEFAULT_REGISTRATION_NAME.to_string(),
            allow_web_fallback: true,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
            enable_logging: false,
            log_level: None,
        }
    }
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl PluginConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: PluginConfig =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional config file and `LAIRD_*` environment variables
    #[cfg(feature = "config-file")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let config: PluginConfig = builder
            .add_source(config::Environment::with_prefix("LAIRD").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registration_name.trim().is_empty() {
            return Err(ConfigError::Invalid("registration_name must not be empty".to_string()));
        }
        if self.write_chunk_size == 0 {
            return Err(ConfigError::Invalid("write_chunk_size must be greater than 0".to_string()));
        }
        if self.scan_interval_ms == 0 {
            return Err(ConfigError::Invalid("scan_interval_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

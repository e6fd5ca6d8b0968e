#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for shardex
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/shardex/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;
pub mod sections;

pub use sections::{ExecutorConfig, LoggingConfig};

use constants::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, ENV_LOG_LEVEL, ENV_MAX_CONNECTIONS_PER_DATA_SOURCE,
    ENV_STRICT_MODE, ENV_TIMEOUT_MS, ENV_WORKER_POOL_SIZE,
};
use serde::{Deserialize, Serialize};
use shardex_errors::{ConfigError, Error};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        debug!(path = %path.display(), "loading configuration");
        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(size) = std::env::var(ENV_WORKER_POOL_SIZE) {
            self.executor.worker_pool_size =
                size.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_WORKER_POOL_SIZE.to_string(),
                    value: size,
                })?;
        }

        if let Ok(limit) = std::env::var(ENV_MAX_CONNECTIONS_PER_DATA_SOURCE) {
            self.executor.max_connections_per_data_source =
                limit.parse().map_err(|_| ConfigError::InvalidValue {
                    field: ENV_MAX_CONNECTIONS_PER_DATA_SOURCE.to_string(),
                    value: limit,
                })?;
        }

        if let Ok(strict) = std::env::var(ENV_STRICT_MODE) {
            self.executor.strict_mode = match strict.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: ENV_STRICT_MODE.to_string(),
                        value: strict,
                    }
                    .into())
                }
            };
        }

        if let Ok(timeout) = std::env::var(ENV_TIMEOUT_MS) {
            let millis: u64 = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_TIMEOUT_MS.to_string(),
                value: timeout,
            })?;
            self.executor.timeout_ms = (millis > 0).then_some(millis);
        }

        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Render the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError {
                error: e.to_string(),
            })
            .map_err(Into::into)
    }
}

/// Calculate the worker pool size based on CPU count
#[must_use]
pub fn calculate_pool_size(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Workers mostly block on network I/O, so oversubscribe the CPUs
        (num_cpus::get() * 2).max(1)
    }
}

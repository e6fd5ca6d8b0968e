//! Configuration sections

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parallel executor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize, // 0 = auto-detect
    #[serde(default = "default_max_connections_per_data_source")]
    pub max_connections_per_data_source: usize, // 0 = unlimited
    #[serde(default = "default_strict_mode")]
    pub strict_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ExecutorConfig {
    /// Operation deadline, if one is configured
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Per-data-source connection limit, if one is configured
    #[must_use]
    pub fn connection_limit(&self) -> Option<usize> {
        (self.max_connections_per_data_source > 0).then_some(self.max_connections_per_data_source)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 0,
            max_connections_per_data_source: 0,
            strict_mode: true,
            timeout_ms: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions for serde
fn default_worker_pool_size() -> usize {
    0 // auto-detect
}

fn default_max_connections_per_data_source() -> usize {
    0 // unlimited
}

fn default_strict_mode() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

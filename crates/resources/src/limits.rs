//! Worker pool limits and availability tracking
//!
//! This module defines how many execution units may run at once, in total
//! and against any single data source.

use serde::{Deserialize, Serialize};
use shardex_config::{calculate_pool_size, ExecutorConfig};

/// Pool limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Maximum number of units executing concurrently across all operations
    pub max_workers: usize,
    /// Maximum number of concurrent units against one data source (None = unlimited)
    pub max_connections_per_data_source: Option<usize>,
}

impl PoolLimits {
    /// Create limits with a fixed worker count and no per-data-source bound
    #[must_use]
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            max_connections_per_data_source: None,
        }
    }

    /// Bound concurrent units against any single data source
    #[must_use]
    pub fn with_connections_per_data_source(mut self, limit: usize) -> Self {
        self.max_connections_per_data_source = Some(limit.max(1));
        self
    }

    /// Create limits for testing (lower limits)
    #[must_use]
    pub fn for_testing() -> Self {
        Self::new(4)
    }

    /// Create limits based on system capabilities
    #[must_use]
    pub fn from_system() -> Self {
        Self::new(calculate_pool_size(0))
    }
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self::from_system()
    }
}

/// Trait for converting configurations to pool limits
pub trait IntoPoolLimits {
    /// Convert this configuration into `PoolLimits`
    fn into_pool_limits(self) -> PoolLimits;
}

impl IntoPoolLimits for &ExecutorConfig {
    fn into_pool_limits(self) -> PoolLimits {
        let limits = PoolLimits::new(calculate_pool_size(self.worker_pool_size));
        match self.connection_limit() {
            Some(limit) => limits.with_connections_per_data_source(limit),
            None => limits,
        }
    }
}

/// Snapshot of free capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolAvailability {
    /// Worker permits currently free
    pub workers: usize,
    /// Data sources seen so far with their free connection permits
    pub data_sources: Vec<(String, usize)>,
}

impl PoolAvailability {
    /// Check if all workers are idle
    #[must_use]
    pub fn all_idle(&self, limits: &PoolLimits) -> bool {
        self.workers >= limits.max_workers
    }
}

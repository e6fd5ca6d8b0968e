//! Engine-level execution error types

use std::borrow::Cow;

use crate::{DataAccessError, UserFacingError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionError {
    /// A unit failed against its data source while strict mode was bound.
    #[error("execution unit {index} failed on {data_source}: {source}")]
    UnitFailed {
        index: usize,
        data_source: String,
        #[source]
        source: DataAccessError,
    },

    #[error("contract violated by execution unit {index}: {message}")]
    Contract { index: usize, message: String },

    #[error("worker for execution unit {index} panicked: {message}")]
    WorkerPanicked { index: usize, message: String },

    #[error("operation did not finish within {deadline_ms} ms")]
    Timeout { deadline_ms: u64 },

    #[error("worker pool is closed: {message}")]
    PoolClosed { message: String },
}

impl ExecutionError {
    /// Index of the execution unit this failure is attributed to, if any.
    #[must_use]
    pub fn unit_index(&self) -> Option<usize> {
        match self {
            Self::UnitFailed { index, .. }
            | Self::Contract { index, .. }
            | Self::WorkerPanicked { index, .. } => Some(*index),
            Self::Timeout { .. } | Self::PoolClosed { .. } => None,
        }
    }
}

impl UserFacingError for ExecutionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnitFailed { source, .. } => source
                .user_hint()
                .or(Some("Run in lenient mode to collect results from healthy shards.")),
            Self::Timeout { .. } => Some("Raise the operation deadline or check slow shards."),
            Self::PoolClosed { .. } => Some("The executor is shutting down; retry on a fresh instance."),
            Self::Contract { .. } | Self::WorkerPanicked { .. } => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::UnitFailed { source, .. } => source.is_retryable(),
            Self::Timeout { .. } => true,
            Self::Contract { .. } | Self::WorkerPanicked { .. } | Self::PoolClosed { .. } => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::UnitFailed { .. } => "execution.unit_failed",
            Self::Contract { .. } => "execution.contract",
            Self::WorkerPanicked { .. } => "execution.worker_panicked",
            Self::Timeout { .. } => "execution.timeout",
            Self::PoolClosed { .. } => "execution.pool_closed",
        })
    }
}

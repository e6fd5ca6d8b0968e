//! Error handling policy for failed execution units

use std::fmt;

use serde::{Deserialize, Serialize};
use shardex_errors::{ExecutionError, UnitError};
use tracing::warn;

use crate::ExecutionResult;

/// What to do when a unit's data-access call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// The first failure aborts the operation.
    Strict,
    /// Failed units yield [`ExecutionResult::Absent`].
    Lenient,
}

impl ErrorPolicy {
    #[must_use]
    pub fn from_strict_mode(strict_mode: bool) -> Self {
        if strict_mode {
            Self::Strict
        } else {
            Self::Lenient
        }
    }

    #[must_use]
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }

    /// Interpret the failure of unit `index`.
    ///
    /// Contract failures always propagate. Data-access failures propagate in
    /// strict mode and become `Absent` in lenient mode.
    ///
    /// # Errors
    ///
    /// Returns the failure to surface for this unit.
    pub fn handle<T>(
        self,
        index: usize,
        data_source: &str,
        error: UnitError,
    ) -> Result<ExecutionResult<T>, ExecutionError> {
        match error {
            UnitError::Contract { message } => Err(ExecutionError::Contract { index, message }),
            UnitError::DataAccess(source) => match self {
                Self::Strict => Err(ExecutionError::UnitFailed {
                    index,
                    data_source: data_source.to_string(),
                    source,
                }),
                Self::Lenient => {
                    warn!(
                        index,
                        data_source,
                        kind = %source.kind,
                        error = %source,
                        "unit failure absorbed"
                    );
                    Ok(ExecutionResult::Absent)
                }
            },
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

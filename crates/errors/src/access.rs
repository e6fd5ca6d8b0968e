//! Data-access error types raised by low-level executors

use std::borrow::Cow;
use std::fmt;

use crate::UserFacingError;
use thiserror::Error;

/// Broad classification of a failed call against a physical data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataAccessKind {
    Connectivity,
    Constraint,
    Timeout,
    Syntax,
    Other,
}

impl DataAccessKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Constraint => "constraint",
            Self::Timeout => "timeout",
            Self::Syntax => "syntax",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DataAccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the data source itself (driver, network, constraint).
///
/// These are the only failures the error-handling policy may swallow.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{kind} failure on data source {data_source}: {message}")]
pub struct DataAccessError {
    pub data_source: String,
    pub kind: DataAccessKind,
    pub message: String,
    /// Vendor SQLSTATE, when the driver reports one.
    pub sql_state: Option<String>,
}

impl DataAccessError {
    pub fn new(
        data_source: impl Into<String>,
        kind: DataAccessKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            kind,
            message: message.into(),
            sql_state: None,
        }
    }

    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

impl UserFacingError for DataAccessError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self.kind {
            DataAccessKind::Connectivity => Some("Check that the data source is reachable."),
            DataAccessKind::Timeout => Some("The data source did not answer in time; retry later."),
            DataAccessKind::Constraint => Some("The statement violates a constraint on the target table."),
            DataAccessKind::Syntax => Some("The statement was rejected by the data source."),
            DataAccessKind::Other => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DataAccessKind::Connectivity | DataAccessKind::Timeout
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self.kind {
            DataAccessKind::Connectivity => "data_access.connectivity",
            DataAccessKind::Constraint => "data_access.constraint",
            DataAccessKind::Timeout => "data_access.timeout",
            DataAccessKind::Syntax => "data_access.syntax",
            DataAccessKind::Other => "data_access.other",
        })
    }
}

/// Outcome of a failed low-level executor call.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitError {
    /// Recoverable per-unit failure, governed by the error-handling policy.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    /// Broken precondition; always propagates.
    #[error("contract violated: {message}")]
    Contract { message: String },
}

impl UnitError {
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_data_access(&self) -> bool {
        matches!(self, Self::DataAccess(_))
    }
}

impl UserFacingError for UnitError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::DataAccess(err) => err.user_message(),
            Self::Contract { .. } => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DataAccess(err) => err.user_hint(),
            Self::Contract { .. } => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::DataAccess(err) => err.is_retryable(),
            Self::Contract { .. } => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::DataAccess(err) => err.user_code(),
            Self::Contract { .. } => Some("execution.contract"),
        }
    }
}

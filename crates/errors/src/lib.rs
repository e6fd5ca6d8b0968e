#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the shardex execution engine
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone so a single failure can be both
//! published to observers and returned to the caller.

use std::borrow::Cow;

use thiserror::Error;

pub mod access;
pub mod config;
pub mod events;
pub mod execution;

// Re-export all error types at the root
pub use access::{DataAccessError, DataAccessKind, UnitError};
pub use config::ConfigError;
pub use events::EventError;
pub use execution::ExecutionError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data access error: {0}")]
    DataAccess(#[from] DataAccessError),

    #[error("event error: {0}")]
    Event(#[from] EventError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(skip, default = "io_kind_other"))]
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the execution error, if this is one.
    #[must_use]
    pub fn as_execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

#[cfg(feature = "serde")]
fn io_kind_other() -> std::io::ErrorKind {
    std::io::ErrorKind::Other
}

/// Result type alias for shardex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for analytics / structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Execution(err) => err.user_message(),
            Error::DataAccess(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Execution(err) => err.user_hint(),
            Error::Config(err) => err.user_hint(),
            Error::DataAccess(err) => err.user_hint(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Execution(err) => err.is_retryable(),
            Error::DataAccess(err) => err.is_retryable(),
            Error::Io { .. } => true,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Execution(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::DataAccess(err) => err.user_code(),
            Error::Event(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}

//! CLI error handling

use std::fmt;

use shardex_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Engine, configuration or data-access error
    Engine(shardex_errors::Error),
    /// Plan file could not be used
    Plan(String),
    /// Data source setup error
    Setup(String),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Stable code and hint for structured output
    pub fn user_code(&self) -> Option<&'static str> {
        match self {
            CliError::Engine(e) => e.user_code(),
            CliError::Plan(_) => Some("cli.plan"),
            CliError::Setup(_) => Some("cli.setup"),
            CliError::Io(_) => Some("error.io"),
        }
    }

    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            CliError::Engine(e) => e.user_hint(),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CliError::Engine(e) => e.is_retryable(),
            CliError::Setup(_) | CliError::Io(_) => true,
            CliError::Plan(_) => false,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Engine(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::Plan(msg) => write!(f, "Invalid plan: {msg}"),
            CliError::Setup(msg) => write!(f, "Data source setup error: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Engine(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<shardex_errors::Error> for CliError {
    fn from(e: shardex_errors::Error) -> Self {
        CliError::Engine(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

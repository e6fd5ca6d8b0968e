use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EventLevel, EventMeta, EventSource};
use shardex_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code, when the error defines one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod execution;
pub mod operation;

pub use execution::*;
pub use operation::*;

/// Top-level event enum published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Per (unit, parameter set) execution attempts
    Unit(ExecutionEvent),

    /// Operation-wide bracketing events
    Operation(OperationEvent),
}

impl EngineEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::Unit(_) => EventSource::EXECUTION,
            Self::Operation(_) => EventSource::OPERATION,
        }
    }

    #[must_use]
    pub fn operation_id(&self) -> Uuid {
        match self {
            Self::Unit(event) => event.operation_id,
            Self::Operation(event) => event.operation_id(),
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::Unit(ExecutionEvent {
                stage: ExecutionStage::Failed { .. },
                ..
            })
            | Self::Operation(OperationEvent::Failed { .. }) => Level::ERROR,

            Self::Operation(OperationEvent::Completed { absent, .. }) if *absent > 0 => {
                Level::WARN
            }

            Self::Unit(_) => Level::DEBUG,

            Self::Operation(_) => Level::INFO,
        }
    }
}

/// Envelope delivered to listeners: metadata plus the event itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub meta: EventMeta,
    pub event: EngineEvent,
}

impl EventMessage {
    #[must_use]
    pub fn new(meta: EventMeta, event: EngineEvent) -> Self {
        Self { meta, event }
    }

    /// Wrap an event with metadata derived from the event itself.
    #[must_use]
    pub fn from_event(event: EngineEvent) -> Self {
        let meta = EventMeta::new(EventLevel::from(event.log_level()), event.event_source())
            .with_correlation_id(event.operation_id().to_string());
        Self { meta, event }
    }
}

//! Built-in event listeners

use shardex_errors::EventError;
use tracing::{debug, error, info, trace, warn, Level};

use crate::{EngineEvent, EventListener, EventMessage, EventSender, ExecutionStage, OperationEvent};

/// Logs every event through `tracing` at the event's own level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn name(&self) -> &str {
        "tracing"
    }

    fn on_event(&self, message: &EventMessage) -> Result<(), EventError> {
        let meta = &message.meta;
        let line = describe(&message.event);
        let correlation = meta.correlation_id.as_deref().unwrap_or("-");
        match meta.tracing_level() {
            Level::ERROR => error!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation,
                "{line}"
            ),
            Level::WARN => warn!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation,
                "{line}"
            ),
            Level::INFO => info!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation,
                "{line}"
            ),
            Level::DEBUG => debug!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation,
                "{line}"
            ),
            Level::TRACE => trace!(
                source = meta.source.as_str(),
                event_id = %meta.event_id,
                correlation,
                "{line}"
            ),
        }
        Ok(())
    }
}

/// One-line human readable description of an event.
#[must_use]
pub fn describe(event: &EngineEvent) -> String {
    match event {
        EngineEvent::Unit(unit) => {
            let stage = match &unit.stage {
                ExecutionStage::Started => "started".to_string(),
                ExecutionStage::Succeeded => "succeeded".to_string(),
                ExecutionStage::Failed { failure } => format!("failed: {}", failure.message),
            };
            format!(
                "{} on {} {} params={} {stage}",
                unit.sql_type, unit.data_source, unit.sql, unit.parameters
            )
        }
        EngineEvent::Operation(OperationEvent::Started {
            sql_type,
            units,
            strict,
            ..
        }) => {
            let mode = if *strict { "strict" } else { "lenient" };
            format!("{sql_type} operation started across {units} units ({mode})")
        }
        EngineEvent::Operation(OperationEvent::Completed {
            present, absent, ..
        }) => format!("operation completed: {present} present, {absent} absent"),
        EngineEvent::Operation(OperationEvent::Failed { failure, .. }) => {
            format!("operation failed: {}", failure.message)
        }
    }
}

/// Forwards events into an unbounded tokio channel for asynchronous consumers.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    sender: EventSender,
}

impl ChannelListener {
    #[must_use]
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }
}

impl EventListener for ChannelListener {
    fn name(&self) -> &str {
        "channel"
    }

    fn on_event(&self, message: &EventMessage) -> Result<(), EventError> {
        self.sender
            .send(message.clone())
            .map_err(|_| EventError::ChannelClosed)
    }
}

#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for the shardex execution engine
//!
//! This crate provides the lifecycle events published while a logical
//! operation fans out over its physical execution units, and the bus that
//! delivers them to observers.
//!
//! ## Architecture
//!
//! - **Constructible bus**: [`EventBus`] is an ordinary value injected into
//!   executors; there is no global registry
//! - **Unified `EventEmitter` trait**: single API for components holding a bus
//! - **Tracing integration**: [`TracingListener`] logs at each event's level
//! - **Async consumers**: [`ChannelListener`] forwards into a tokio channel

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod bus;
pub use bus::{panic_message, EventBus, EventListener, SubscriptionId};

pub mod events;
pub use events::{
    EngineEvent, EventMessage, ExecutionEvent, ExecutionStage, FailureContext, OperationEvent,
};

pub mod listeners;
pub use listeners::{describe, ChannelListener, TracingListener};

use std::sync::Arc;

use shardex_types::SqlType;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Type alias for event sender feeding a [`ChannelListener`]
pub type EventSender = UnboundedSender<EventMessage>;

/// Type alias for event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<EventMessage>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout the engine
///
/// Implementors only say where their bus is; emission helpers are shared.
pub trait EventEmitter {
    /// Get the bus for this emitter
    fn event_bus(&self) -> Option<&EventBus>;

    /// Emit an event through this emitter
    fn emit(&self, event: EngineEvent) {
        if let Some(bus) = self.event_bus() {
            bus.publish(&EventMessage::from_event(event));
        }
    }

    /// Emit the current state of a unit execution event
    fn emit_execution(&self, event: &ExecutionEvent) {
        self.emit(EngineEvent::Unit(event.clone()));
    }

    /// Emit an operation started event
    fn emit_operation_started(
        &self,
        operation_id: Uuid,
        sql_type: SqlType,
        units: usize,
        strict: bool,
    ) {
        self.emit(EngineEvent::Operation(OperationEvent::Started {
            operation_id,
            sql_type,
            units,
            strict,
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation_id: Uuid, present: usize, absent: usize) {
        self.emit(EngineEvent::Operation(OperationEvent::Completed {
            operation_id,
            present,
            absent,
        }));
    }

    /// Emit an operation failed event
    fn emit_operation_failed(&self, operation_id: Uuid, failure: FailureContext) {
        self.emit(EngineEvent::Operation(OperationEvent::Failed {
            operation_id,
            failure,
        }));
    }
}

impl EventEmitter for EventBus {
    fn event_bus(&self) -> Option<&EventBus> {
        Some(self)
    }
}

impl EventEmitter for Arc<EventBus> {
    fn event_bus(&self) -> Option<&EventBus> {
        Some(self)
    }
}

//! Per-unit execution callback

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use shardex_errors::ExecutionError;
use shardex_events::{
    panic_message, EngineEvent, EventBus, EventEmitter, EventMessage, ExecutionEvent,
    FailureContext,
};
use shardex_types::{ExecutionUnit, SqlType};
use tracing::{debug, error};
use uuid::Uuid;

use crate::context::{self, ExecutionContext};
use crate::{ExecutionResult, UnitExecutor};

/// Runs one execution unit on behalf of an operation.
///
/// Binds the operation context, publishes one event per parameter set
/// before and after the low-level call, and applies the error policy.
/// Published events carry the operation diagnostics as labels.
pub struct ExecuteCallback<E> {
    operation_id: Uuid,
    sql_type: SqlType,
    context: Arc<ExecutionContext>,
    labels: BTreeMap<String, String>,
    executor: Arc<E>,
    bus: Arc<EventBus>,
}

impl<E> ExecuteCallback<E> {
    #[must_use]
    pub fn new(
        operation_id: Uuid,
        sql_type: SqlType,
        context: Arc<ExecutionContext>,
        executor: Arc<E>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            operation_id,
            sql_type,
            labels: context.diagnostic_labels(),
            context,
            executor,
            bus,
        }
    }

    /// Execute unit `index` with the operation context bound.
    ///
    /// Every event published for the unit reaches a terminal stage before
    /// this returns, including when the executor panics.
    ///
    /// # Errors
    ///
    /// Returns `UnitFailed` for a data-access failure in strict mode,
    /// `Contract` for a contract failure, and `WorkerPanicked` if the
    /// executor panics.
    pub async fn execute<T>(
        &self,
        index: usize,
        unit: Arc<ExecutionUnit>,
    ) -> Result<ExecutionResult<T>, ExecutionError>
    where
        E: UnitExecutor<T>,
    {
        context::scope(Arc::clone(&self.context), self.run(index, unit)).await
    }

    async fn run<T>(
        &self,
        index: usize,
        unit: Arc<ExecutionUnit>,
    ) -> Result<ExecutionResult<T>, ExecutionError>
    where
        E: UnitExecutor<T>,
    {
        let mut events: Vec<ExecutionEvent> = unit
            .parameter_sets()
            .iter()
            .map(|parameters| {
                ExecutionEvent::started(self.operation_id, self.sql_type, &unit, parameters)
            })
            .collect();
        for event in &events {
            self.emit_execution(event);
        }

        let outcome = AssertUnwindSafe(self.executor.execute(Arc::clone(&unit)))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                for event in &mut events {
                    event.mark_succeeded();
                    self.emit_execution(event);
                }
                debug!(index, data_source = unit.data_source(), "unit succeeded");
                Ok(ExecutionResult::Present(value))
            }
            Ok(Err(failure)) => {
                self.fail_events(&mut events, &FailureContext::from_error(&failure));
                debug!(
                    index,
                    data_source = unit.data_source(),
                    error = %failure,
                    "unit failed"
                );
                self.context
                    .policy()
                    .handle(index, unit.data_source(), failure)
            }
            Err(payload) => {
                let panicked = ExecutionError::WorkerPanicked {
                    index,
                    message: panic_message(&*payload),
                };
                self.fail_events(&mut events, &FailureContext::from_error(&panicked));
                error!(index, data_source = unit.data_source(), error = %panicked, "executor panicked");
                Err(panicked)
            }
        }
    }

    fn fail_events(&self, events: &mut [ExecutionEvent], failure: &FailureContext) {
        for event in events {
            event.mark_failed(failure.clone());
            self.emit_execution(event);
        }
    }
}

impl<E> EventEmitter for ExecuteCallback<E> {
    fn event_bus(&self) -> Option<&EventBus> {
        Some(&self.bus)
    }

    fn emit(&self, event: EngineEvent) {
        let EventMessage { meta, event } = EventMessage::from_event(event);
        let meta = meta.with_labels(self.labels.clone());
        self.bus.publish(&EventMessage::new(meta, event));
    }
}

//! Parallel execution coordinator
//!
//! Fans the units of one logical operation out over the shared worker pool
//! and reassembles their results in input order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use shardex_config::ExecutorConfig;
use shardex_errors::{Error, ExecutionError};
use shardex_events::{panic_message, EventBus, EventEmitter, FailureContext};
use shardex_resources::{IntoPoolLimits, WorkerPermit, WorkerPool};
use shardex_types::{ExecutionUnit, SqlType};
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{ExecuteCallback, ExecutionContext, ExecutionResult, UnitExecutor};

/// Executes routed units concurrently on a bounded pool.
///
/// Cheap to clone; clones share the pool and the event bus.
#[derive(Debug, Clone)]
pub struct ExecutorEngine {
    pool: WorkerPool,
    bus: Arc<EventBus>,
}

impl ExecutorEngine {
    #[must_use]
    pub fn new(pool: WorkerPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Build an engine sized by the executor configuration
    #[must_use]
    pub fn from_config(config: &ExecutorConfig, bus: Arc<EventBus>) -> Self {
        Self::new(WorkerPool::new(config.into_pool_limits()), bus)
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Run every unit and return their results in input order.
    ///
    /// A single unit runs on the calling task; more are spawned onto the
    /// pool, queueing in input order once it is saturated. A failure stops
    /// further dispatch.
    ///
    /// # Errors
    ///
    /// In strict mode, returns the first unit failure to complete. Contract
    /// failures and executor panics are returned in either mode.
    pub async fn run_all<T, E>(
        &self,
        sql_type: SqlType,
        units: Vec<ExecutionUnit>,
        context: ExecutionContext,
        executor: Arc<E>,
    ) -> Result<Vec<ExecutionResult<T>>, Error>
    where
        T: Send + 'static,
        E: UnitExecutor<T>,
    {
        let settled = AtomicBool::new(false);
        self.run_operation(Uuid::new_v4(), sql_type, units, context, executor, &settled)
            .await
    }

    /// [`run_all`](Self::run_all) with a deadline on the wait.
    ///
    /// Workers still running at the deadline are left to finish on their
    /// own; only the wait is abandoned. Exactly one terminal operation event
    /// is published either way.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` if the deadline passes first, and
    /// otherwise whatever `run_all` returns.
    pub async fn run_all_with_timeout<T, E>(
        &self,
        sql_type: SqlType,
        units: Vec<ExecutionUnit>,
        context: ExecutionContext,
        executor: Arc<E>,
        deadline: Duration,
    ) -> Result<Vec<ExecutionResult<T>>, Error>
    where
        T: Send + 'static,
        E: UnitExecutor<T>,
    {
        let operation_id = Uuid::new_v4();
        let settled = Arc::new(AtomicBool::new(false));
        let mut operation = tokio::spawn({
            let engine = self.clone();
            let settled = Arc::clone(&settled);
            async move {
                engine
                    .run_operation(operation_id, sql_type, units, context, executor, &settled)
                    .await
            }
        });

        match tokio::time::timeout(deadline, &mut operation).await {
            Ok(joined) => flatten_join(operation_id, joined),
            Err(_) if settle(&settled) => {
                let timeout = ExecutionError::Timeout {
                    deadline_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                };
                warn!(%operation_id, error = %timeout, "abandoning operation wait");
                self.emit_operation_failed(operation_id, FailureContext::from_error(&timeout));
                Err(timeout.into())
            }
            // Settled between the deadline and the claim; its outcome is ready.
            Err(_) => flatten_join(operation_id, operation.await),
        }
    }

    async fn run_operation<T, E>(
        &self,
        operation_id: Uuid,
        sql_type: SqlType,
        units: Vec<ExecutionUnit>,
        context: ExecutionContext,
        executor: Arc<E>,
        settled: &AtomicBool,
    ) -> Result<Vec<ExecutionResult<T>>, Error>
    where
        T: Send + 'static,
        E: UnitExecutor<T>,
    {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let context = Arc::new(context);
        let policy = context.policy();
        let total = units.len();
        self.emit_operation_started(operation_id, sql_type, total, policy.is_strict());
        debug!(%operation_id, %sql_type, units = total, %policy, "dispatching operation");

        let callback = Arc::new(ExecuteCallback::new(
            operation_id,
            sql_type,
            context,
            executor,
            Arc::clone(&self.bus),
        ));

        let outcome = if total == 1 {
            self.run_inline(&callback, units).await
        } else {
            self.run_pooled(&callback, units).await
        };

        if !settle(settled) {
            debug!(%operation_id, "operation finished after its wait was abandoned");
            return outcome;
        }

        match outcome {
            Ok(results) => {
                let present = results.iter().filter(|r| r.is_present()).count();
                let absent = total - present;
                if absent > 0 {
                    warn!(%operation_id, present, absent, "operation completed with absent results");
                } else {
                    info!(%operation_id, units = total, "operation completed");
                }
                self.emit_operation_completed(operation_id, present, absent);
                Ok(results)
            }
            Err(error) => {
                warn!(%operation_id, %error, "operation failed");
                self.emit_operation_failed(operation_id, FailureContext::from_error(&error));
                Err(error)
            }
        }
    }

    async fn run_inline<T, E>(
        &self,
        callback: &ExecuteCallback<E>,
        units: Vec<ExecutionUnit>,
    ) -> Result<Vec<ExecutionResult<T>>, Error>
    where
        T: Send + 'static,
        E: UnitExecutor<T>,
    {
        let Some(unit) = units.into_iter().next() else {
            return Ok(Vec::new());
        };
        let _permit = self.pool.acquire(unit.data_source()).await?;
        let result = callback.execute(0, Arc::new(unit)).await?;
        Ok(vec![result])
    }

    /// Admit units in input order while collecting finished workers.
    ///
    /// The first failure returns at once: units still waiting for a permit
    /// are never dispatched and in-flight workers are detached.
    async fn run_pooled<T, E>(
        &self,
        callback: &Arc<ExecuteCallback<E>>,
        units: Vec<ExecutionUnit>,
    ) -> Result<Vec<ExecutionResult<T>>, Error>
    where
        T: Send + 'static,
        E: UnitExecutor<T>,
    {
        let total = units.len();
        let mut queued = units.into_iter().enumerate();
        let mut admission = Box::pin(admit(self.pool.clone(), queued.next()));
        let mut admitting = true;
        let mut workers: FuturesUnordered<BoxFuture<'static, Joined<T>>> = FuturesUnordered::new();
        let mut slots: Vec<Option<ExecutionResult<T>>> = (0..total).map(|_| None).collect();

        loop {
            tokio::select! {
                biased;

                Some((index, joined)) = workers.next(), if !workers.is_empty() => match joined {
                    Ok(Ok(result)) => {
                        if let Some(slot) = slots.get_mut(index) {
                            *slot = Some(result);
                        }
                    }
                    Ok(Err(error)) => {
                        debug!(
                            index,
                            in_flight = workers.len(),
                            "detaching remaining workers after failure"
                        );
                        return Err(error.into());
                    }
                    Err(join_error) => {
                        return Err(ExecutionError::WorkerPanicked {
                            index,
                            message: join_failure(join_error),
                        }
                        .into());
                    }
                },

                admitted = &mut admission, if admitting => match admitted {
                    Some(Ok((index, unit, permit))) => {
                        let callback = Arc::clone(callback);
                        let handle = tokio::spawn(async move {
                            let _permit = permit;
                            callback.execute(index, Arc::new(unit)).await
                        });
                        workers.push(async move { (index, handle.await) }.boxed());
                        admission.set(admit(self.pool.clone(), queued.next()));
                    }
                    Some(Err(error)) => return Err(error),
                    None => admitting = false,
                },

                else => break,
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| Error::internal(format!("no result collected for unit {index}")))
            })
            .collect()
    }
}

impl EventEmitter for ExecutorEngine {
    fn event_bus(&self) -> Option<&EventBus> {
        Some(&self.bus)
    }
}

/// Outcome of one spawned worker, tagged with its unit index
type Joined<T> = (
    usize,
    Result<Result<ExecutionResult<T>, ExecutionError>, JoinError>,
);

/// Wait for the permit of the next queued unit, if any.
async fn admit(
    pool: WorkerPool,
    next: Option<(usize, ExecutionUnit)>,
) -> Option<Result<(usize, ExecutionUnit, WorkerPermit), Error>> {
    let (index, unit) = next?;
    let permit = pool.acquire(unit.data_source()).await;
    Some(permit.map(|permit| (index, unit, permit)))
}

/// Claim the right to publish the terminal operation event.
fn settle(settled: &AtomicBool) -> bool {
    settled
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

fn flatten_join<R>(
    operation_id: Uuid,
    joined: Result<Result<R, Error>, JoinError>,
) -> Result<R, Error> {
    match joined {
        Ok(outcome) => outcome,
        Err(join_error) => Err(Error::internal(format!(
            "operation {operation_id} aborted: {}",
            join_failure(join_error)
        ))),
    }
}

fn join_failure(join_error: JoinError) -> String {
    if join_error.is_panic() {
        panic_message(&*join_error.into_panic())
    } else {
        "worker task was cancelled".to_string()
    }
}

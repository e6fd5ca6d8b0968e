use std::future::Future;
use std::sync::Arc;

use shardex_errors::UnitError;
use shardex_types::ExecutionUnit;

/// Performs the actual data-access call for one unit.
///
/// Implemented for any `Fn(Arc<ExecutionUnit>) -> impl Future` closure, so
/// callers can pass a closure directly.
pub trait UnitExecutor<T>: Send + Sync + 'static {
    fn execute(
        &self,
        unit: Arc<ExecutionUnit>,
    ) -> impl Future<Output = Result<T, UnitError>> + Send;
}

impl<T, F, Fut> UnitExecutor<T> for F
where
    F: Fn(Arc<ExecutionUnit>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, UnitError>> + Send,
{
    fn execute(
        &self,
        unit: Arc<ExecutionUnit>,
    ) -> impl Future<Output = Result<T, UnitError>> + Send {
        self(unit)
    }
}

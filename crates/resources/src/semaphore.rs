//! Semaphore utilities for resource management
//!
//! Helpers for acquiring permits with consistent error handling.

use shardex_errors::{Error, ExecutionError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Acquire a semaphore permit with proper error handling
///
/// Permits are handed out in request order.
///
/// # Errors
///
/// Returns an error if the semaphore is closed.
pub async fn acquire_semaphore_permit(
    semaphore: Arc<Semaphore>,
    operation: &str,
) -> Result<OwnedSemaphorePermit, Error> {
    semaphore.acquire_owned().await.map_err(|_| {
        ExecutionError::PoolClosed {
            message: format!("failed to acquire semaphore for {operation}"),
        }
        .into()
    })
}

/// Try to acquire a semaphore permit without waiting
///
/// Returns `Ok(Some(permit))` if successful, `Ok(None)` if would block.
///
/// # Errors
///
/// Returns an error if the semaphore is closed.
pub fn try_acquire_semaphore_permit(
    semaphore: &Arc<Semaphore>,
) -> Result<Option<OwnedSemaphorePermit>, Error> {
    match Arc::clone(semaphore).try_acquire_owned() {
        Ok(permit) => Ok(Some(permit)),
        Err(tokio::sync::TryAcquireError::NoPermits) => Ok(None),
        Err(tokio::sync::TryAcquireError::Closed) => Err(ExecutionError::PoolClosed {
            message: "semaphore is closed".to_string(),
        }
        .into()),
    }
}

/// Create a semaphore with a specified number of permits
#[must_use]
pub fn create_semaphore(permits: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(permits))
}

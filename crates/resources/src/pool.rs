//! Bounded worker pool shared by concurrent operations

use std::sync::Arc;

use dashmap::DashMap;
use shardex_errors::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::semaphore::{acquire_semaphore_permit, create_semaphore, try_acquire_semaphore_permit};
use crate::{PoolAvailability, PoolLimits};

/// Capacity bound on concurrently executing units.
///
/// Clones share the same permits, so one pool bounds every operation that
/// runs through it.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    limits: PoolLimits,
    workers: Arc<Semaphore>,
    data_sources: Arc<DashMap<String, Arc<Semaphore>>>,
}

/// Permission to run one unit. Dropping it frees the slot.
#[derive(Debug)]
pub struct WorkerPermit {
    _connection: Option<OwnedSemaphorePermit>,
    _worker: OwnedSemaphorePermit,
}

impl WorkerPool {
    #[must_use]
    pub fn new(limits: PoolLimits) -> Self {
        Self {
            limits,
            workers: create_semaphore(limits.max_workers),
            data_sources: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Wait for a free slot to run a unit against `data_source`.
    ///
    /// The data-source permit is taken before the worker permit so that a
    /// unit waiting on a saturated data source does not hold a worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool has been closed.
    pub async fn acquire(&self, data_source: &str) -> Result<WorkerPermit, Error> {
        let connection = match self.connection_semaphore(data_source) {
            Some(semaphore) => Some(acquire_semaphore_permit(semaphore, data_source).await?),
            None => None,
        };
        let worker = acquire_semaphore_permit(Arc::clone(&self.workers), "worker").await?;
        trace!(
            data_source,
            free_workers = self.workers.available_permits(),
            "worker permit acquired"
        );
        Ok(WorkerPermit {
            _connection: connection,
            _worker: worker,
        })
    }

    /// Take a slot only if one is free right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool has been closed.
    pub fn try_acquire(&self, data_source: &str) -> Result<Option<WorkerPermit>, Error> {
        let connection = match self.connection_semaphore(data_source) {
            Some(semaphore) => match try_acquire_semaphore_permit(&semaphore)? {
                Some(permit) => Some(permit),
                None => return Ok(None),
            },
            None => None,
        };
        Ok(try_acquire_semaphore_permit(&self.workers)?.map(|worker| WorkerPermit {
            _connection: connection,
            _worker: worker,
        }))
    }

    /// Stop handing out permits; pending and future acquisitions fail.
    pub fn close(&self) {
        self.workers.close();
        for entry in self.data_sources.iter() {
            entry.value().close();
        }
    }

    #[must_use]
    pub fn availability(&self) -> PoolAvailability {
        let mut data_sources: Vec<(String, usize)> = self
            .data_sources
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().available_permits()))
            .collect();
        data_sources.sort();
        PoolAvailability {
            workers: self.workers.available_permits(),
            data_sources,
        }
    }

    fn connection_semaphore(&self, data_source: &str) -> Option<Arc<Semaphore>> {
        let limit = self.limits.max_connections_per_data_source?;
        if let Some(existing) = self.data_sources.get(data_source) {
            return Some(Arc::clone(existing.value()));
        }
        let entry = self
            .data_sources
            .entry(data_source.to_string())
            .or_insert_with(|| {
                let semaphore = create_semaphore(limit);
                if self.workers.is_closed() {
                    semaphore.close();
                }
                semaphore
            });
        Some(Arc::clone(entry.value()))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(PoolLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let pool = WorkerPool::new(PoolLimits::new(2));
        let first = pool.acquire("ds_0").await.unwrap();
        let _second = pool.acquire("ds_1").await.unwrap();
        assert!(pool.try_acquire("ds_2").unwrap().is_none());

        drop(first);
        assert!(pool.try_acquire("ds_2").unwrap().is_some());
    }

    #[tokio::test]
    async fn data_source_limit_is_independent_of_worker_limit() {
        let pool = WorkerPool::new(PoolLimits::new(8).with_connections_per_data_source(1));
        let _held = pool.acquire("ds_0").await.unwrap();

        assert!(pool.try_acquire("ds_0").unwrap().is_none());
        assert!(pool.try_acquire("ds_1").unwrap().is_some());

        let availability = pool.availability();
        assert_eq!(availability.data_sources[0], ("ds_0".to_string(), 0));
        assert_eq!(availability.workers, 7);
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquisition() {
        let pool = WorkerPool::new(PoolLimits::new(1));
        pool.close();
        assert!(pool.acquire("ds_0").await.is_err());
        assert!(pool.try_acquire("ds_0").is_err());
    }
}

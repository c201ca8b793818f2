use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SchedulerError;

/// Bounded-capacity, cancellation-aware worker pool keyed by region name —
/// the concrete analog of the original's `ThreadGroupManager`: at most one
/// worker runs per region at a time, and no more than `capacity` workers run
/// across all regions at once.
///
/// Enforces "a new worker is not launched if one already exists" by
/// construction: [`RegionWorkerPool::spawn`] checks and registers the region
/// atomically under the same lock.
#[derive(Clone)]
pub struct RegionWorkerPool {
    capacity: Arc<Semaphore>,
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl RegionWorkerPool {
    pub fn new(capacity: usize) -> Self {
        RegionWorkerPool {
            capacity: Arc::new(Semaphore::new(capacity.max(1))),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True if a worker is currently registered for `region`.
    pub async fn is_running(&self, region: &str) -> bool {
        self.active.lock().await.contains_key(region)
    }

    /// Requests cancellation of the worker running for `region`, if any.
    /// Returns `true` if a worker was found and signaled.
    pub async fn cancel(&self, region: &str) -> bool {
        if let Some(token) = self.active.lock().await.get(region) {
            token.cancel();
            true
        } else {
            false
        }
    }

    pub async fn cancel_all(&self) {
        let guard = self.active.lock().await;
        for token in guard.values() {
            token.cancel();
        }
    }

    /// Registers and spawns a worker for `region` running `make_future`,
    /// which receives a [`CancellationToken`] it should observe cooperatively.
    /// Refuses to spawn (without blocking) if a worker is already registered
    /// for this region. The worker's pool-capacity permit and region
    /// registration are both released on completion, regardless of outcome —
    /// mirroring the original's always-cleanup `try/except/finally`.
    pub async fn spawn<F, Fut>(&self, region: impl Into<String>, make_future: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let region = region.into();
        let token = CancellationToken::new();

        {
            let mut guard = self.active.lock().await;
            if guard.contains_key(&region) {
                debug!(region = %region, "worker already running, not launching another");
                return Err(SchedulerError::WorkerAlreadyRunning(region));
            }
            guard.insert(region.clone(), token.clone());
        }

        let permit = self
            .capacity
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::PoolClosed)?;
        let active = self.active.clone();
        let region_for_task = region.clone();

        tokio::spawn(async move {
            let fut = make_future(token);
            fut.await;
            drop(permit);
            active.lock().await.remove(&region_for_task);
        });

        Ok(())
    }
}

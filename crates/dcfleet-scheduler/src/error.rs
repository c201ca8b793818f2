use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a worker is already running for region '{0}'")]
    WorkerAlreadyRunning(String),

    #[error("worker pool semaphore closed")]
    PoolClosed,
}

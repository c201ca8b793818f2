pub mod error;
pub mod pool;

pub use error::SchedulerError;
pub use pool::RegionWorkerPool;

use thiserror::Error;

use dcfleet_driver::DriverError;
use dcfleet_store::StoreError;

/// Errors raised by a sync pass or differential audit. `EndpointNotReachable`
/// is the one case the original's `sync()` raises deliberately (rather than
/// propagating a driver error): the retry budget for a request was exhausted
/// on a reachability failure, and the remaining queued requests for this
/// target are abandoned for the pass rather than attempted individually.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("endpoint not reachable, pass aborted with requests pending")]
    EndpointNotReachable,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

use thiserror::Error;

use dcfleet_driver::DriverError;
use dcfleet_store::StoreError;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

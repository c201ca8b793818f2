use thiserror::Error;

use dcfleet_domain::DomainError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subcloud group not found: {0}")]
    GroupNotFound(i64),

    #[error("subcloud not found: {0}")]
    SubcloudNotFound(i64),

    #[error("no active strategy")]
    NoActiveStrategy,

    #[error("orch request not found: {0}")]
    OrchRequestNotFound(uuid::Uuid),

    #[error("resource not found: {0}")]
    ResourceNotFound(uuid::Uuid),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("internal store error: {0}")]
    Internal(String),
}

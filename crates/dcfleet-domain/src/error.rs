use thiserror::Error;

/// Validation failures for the §3 data-model invariants.
///
/// These map to `BadRequest` at whatever external boundary constructs the
/// entity (the REST surface, out of scope here); the core only needs to be
/// able to refuse an invalid construction and say why.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("group name must not be empty")]
    EmptyGroupName,

    #[error("group name '{0}' must not be purely numeric (it would collide with id lookups)")]
    NumericGroupName(String),

    #[error("max_parallel_subclouds {0} is out of range [1,100]")]
    MaxParallelOutOfRange(u8),

    #[error("the Default group (id=1) cannot be deleted")]
    DefaultGroupUndeletable,

    #[error("a strategy already exists")]
    StrategyAlreadyExists,

    #[error("candidate subcloud '{0}' has unknown endpoint sync-status; cannot create a strategy")]
    UnknownEndpointStatus(String),

    #[error("invalid strategy apply_type (must be serial or parallel)")]
    InvalidApplyType,

    #[error("strategy transition from {from:?} to {to:?} is not permitted")]
    InvalidStrategyTransition { from: String, to: String },
}

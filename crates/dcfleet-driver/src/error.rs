use thiserror::Error;

use dcfleet_domain::SubcloudId;

/// Errors a capability client can raise. The fatal/retryable split matters to
/// callers (sync engine retries on `Unreachable`/`Timeout` up to
/// `MAX_RETRY`; everything else is surfaced immediately).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("subcloud {0} is unreachable")]
    Unreachable(SubcloudId),

    #[error("call to subcloud {subcloud} timed out after {deadline_secs}s")]
    Timeout { subcloud: SubcloudId, deadline_secs: u64 },

    #[error("authentication to subcloud {0} failed")]
    AuthenticationFailed(SubcloudId),

    #[error("subcloud {subcloud} rejected the request: {message}")]
    Rejected { subcloud: SubcloudId, message: String },

    #[error("internal driver error: {0}")]
    Internal(String),
}

impl DriverError {
    /// Whether the sync/audit retry loop should retry this call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::Unreachable(_) | DriverError::Timeout { .. })
    }
}

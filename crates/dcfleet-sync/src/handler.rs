use async_trait::async_trait;

use dcfleet_domain::OrchRequest;

/// Outcome of invoking a resource-type's sync handler on one queued request,
/// matching the original's exception taxonomy in `sync_thread.py::sync`.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Request applied successfully; caller soft-deletes it.
    Completed,
    /// `SyncRequestTimeout`: caller bumps try_count and retries until
    /// MAX_RETRY is exhausted, then raises `EndpointNotReachable`.
    Timeout,
    /// `SyncRequestFailedRetry`: caller bumps try_count, marks the request
    /// failed, but keeps retrying up to MAX_RETRY.
    FailedRetry(String),
    /// `SyncRequestFailed`: terminal failure, no further retries.
    Failed(String),
}

/// Per resource-type push handler: applies one queued `OrchRequest` against
/// the subcloud. Generalizes the original's resource-implementation
/// subclasses (`create_*`/`update_*`/`delete_*` per OpenStack resource type).
#[async_trait]
pub trait ResourceSyncHandler: Send + Sync + 'static {
    async fn sync_request(&self, req: &OrchRequest) -> SyncOutcome;
}

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dcfleet_domain::{OrchRequestState, SyncStatus, MAX_RETRY};
use dcfleet_store::StoreError;

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::handler::SyncOutcome;

impl SyncEngine {
    /// Drains the OrchRequest queue for this (subcloud, endpoint) target.
    /// Grounded directly in `sync_thread.py::sync`: queue fetch, an
    /// endpoint-status write based on queue non-emptiness, a per-request
    /// retry loop bounded by `MAX_RETRY`, then a second status write
    /// reflecting whatever remains. Both status writes go through the
    /// store's debounced `set_endpoint_status`, so a pass that doesn't
    /// actually change anything costs no write.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        info!(subcloud = %self.subcloud_id, endpoint = %self.endpoint_type, "starting sync routine");

        let requests = self.fetch_target_requests().await?;
        info!(count = requests.len(), "got sync request(s)");

        self.report_status(&requests, Utc::now()).await?;

        let subcloud = self
            .store
            .get_subcloud(self.subcloud_id)
            .await?
            .ok_or(StoreError::SubcloudNotFound(self.subcloud_id.0))?;
        let subcloud_enabled = !subcloud.is_disabled_for_sync();

        let actual: Vec<_> = requests
            .into_iter()
            .filter(|r| r.state != OrchRequestState::Failed)
            .collect();

        if actual.is_empty() || !subcloud_enabled {
            if !subcloud_enabled {
                debug!("subcloud is disabled, not processing sync requests");
            }
            let remaining = self.fetch_target_requests().await?;
            self.report_status(&remaining, Utc::now()).await?;
            return Ok(());
        }

        for mut request in actual {
            if cancel.is_cancelled() || subcloud_disabled_now(self).await? {
                info!("endpoint disabled mid-pass, abandoning remaining requests");
                break;
            }

            let now = Utc::now();
            request.state = OrchRequestState::InProgress;
            match self.store.update_orch_request(request.clone()).await {
                Ok(()) => {}
                Err(StoreError::OrchRequestNotFound(id)) => {
                    info!(%id, "orch request already deleted, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            let handler = match self.handlers.get(&request.resource_type) {
                Some(h) => h.clone(),
                None => {
                    info!(resource_type = %request.resource_type, "no sync handler registered, skipping");
                    continue;
                }
            };

            let mut retry_count = 0u32;
            loop {
                match handler.sync_request(&request).await {
                    SyncOutcome::Completed => {
                        request.state = OrchRequestState::Completed;
                        request.deleted_at = Some(Utc::now());
                        self.store.update_orch_request(request).await.ok();
                        break;
                    }
                    SyncOutcome::Timeout => {
                        request.bump_try_count(Utc::now());
                        self.store.update_orch_request(request.clone()).await.ok();
                        retry_count += 1;
                        if retry_count >= MAX_RETRY {
                            info!("retries exhausted on timeout, endpoint not reachable");
                            let remaining = self.fetch_target_requests().await?;
                            self.report_status(&remaining, Utc::now()).await?;
                            return Err(SyncError::EndpointNotReachable);
                        }
                    }
                    SyncOutcome::FailedRetry(details) => {
                        request.bump_try_count(Utc::now());
                        request.state = OrchRequestState::Failed;
                        self.store.update_orch_request(request.clone()).await.ok();
                        retry_count += 1;
                        debug!(%details, "sync request failed, will retry");
                        if retry_count >= MAX_RETRY {
                            break;
                        }
                    }
                    SyncOutcome::Failed(details) => {
                        request.state = OrchRequestState::Failed;
                        self.store.update_orch_request(request).await.ok();
                        debug!(%details, "sync request failed, no further retries");
                        break;
                    }
                }
            }
        }

        let remaining = self.fetch_target_requests().await?;
        self.report_status(&remaining, Utc::now()).await?;
        info!("sync resources done for subcloud");
        Ok(())
    }

    async fn fetch_target_requests(&self) -> Result<Vec<dcfleet_domain::OrchRequest>, SyncError> {
        let all = self.store.list_orch_requests(self.subcloud_id).await?;
        Ok(all
            .into_iter()
            .filter(|r| {
                r.endpoint_type == self.endpoint_type
                    && matches!(
                        r.state,
                        OrchRequestState::Queued | OrchRequestState::InProgress | OrchRequestState::Failed
                    )
            })
            .collect())
    }

    async fn report_status(
        &self,
        requests: &[dcfleet_domain::OrchRequest],
        now: chrono::DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let status = if requests.is_empty() {
            SyncStatus::InSync
        } else {
            SyncStatus::OutOfSync
        };
        self.store
            .set_endpoint_status(self.subcloud_id, self.endpoint_type, status, now)
            .await?;
        Ok(())
    }
}

async fn subcloud_disabled_now(engine: &SyncEngine) -> Result<bool, SyncError> {
    let subcloud = engine
        .store
        .get_subcloud(engine.subcloud_id)
        .await?
        .ok_or(StoreError::SubcloudNotFound(engine.subcloud_id.0))?;
    Ok(subcloud.is_disabled_for_sync())
}

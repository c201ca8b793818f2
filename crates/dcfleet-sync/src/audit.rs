use chrono::Utc;
use tracing::{debug, info};

use dcfleet_domain::{Operation, OrchRequest, OrchRequestState, Resource, SubcloudResource};
use dcfleet_messaging::ControlPlaneEvent;

use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::resource::{MasterResource, ObservedResource, ResourceProvider};

impl SyncEngine {
    /// Audit-only entry point: skips the pass entirely if this endpoint is
    /// in the disabled-audit set. Kept separate from `sync_audit` because
    /// the original logs a distinct "disabled" message before bailing,
    /// matching `run_sync_audit`/`sync_audit`.
    pub async fn run_sync_audit(&self, disabled_endpoints: &[dcfleet_domain::EndpointType]) -> Result<(), SyncError> {
        if disabled_endpoints.contains(&self.endpoint_type) {
            info!(endpoint = %self.endpoint_type, "audit disabled");
            return Ok(());
        }
        info!("sync_audit started");
        self.sync_audit().await
    }

    /// Differential audit across every registered resource type for this
    /// target: fetch master/DB/subcloud resource sets, diff them, and
    /// schedule create/delete `OrchRequest`s for anything out of sync.
    /// Resources with an outstanding queued/in-progress request are skipped
    /// this round to avoid duplicate work. Grounded in
    /// `sync_thread.py::sync_audit`.
    pub async fn sync_audit(&self) -> Result<(), SyncError> {
        let mut total_jobs = 0usize;

        for resource_type in self.audit_resource_types.clone() {
            if self
                .store
                .get_subcloud(self.subcloud_id)
                .await?
                .map(|s| s.is_disabled_for_sync())
                .unwrap_or(true)
            {
                info!("aborting sync audit, subcloud is disabled");
                return Ok(());
            }

            let pending = self.pending_sync_requests(&resource_type).await?;
            let abort_ids: Vec<String> = pending.iter().map(|r| r.source_resource_id.clone()).collect();
            if !abort_ids.is_empty() {
                info!(?abort_ids, count = abort_ids.len(), "will not audit, sync request(s) pending");
            }

            let Some(provider) = self.providers.get(&resource_type).cloned() else {
                debug!(resource_type = %resource_type, "no resource provider registered, skipping audit");
                continue;
            };

            let sc_resources = match provider.fetch_subcloud_resources(self.subcloud_id, &resource_type).await? {
                Some(r) => r,
                None => {
                    info!(resource_type = %resource_type, "subcloud unreachable, aborting audit for this type");
                    continue;
                }
            };
            let m_resources = self.cache.get_or_fetch(&resource_type, provider.as_ref()).await?;
            let db_resources = self.store.list_resources(&resource_type).await?;

            info!(resource_type = %resource_type, "audit");
            let mut remaining_db = db_resources;
            let missing_jobs = self
                .audit_find_missing(
                    &resource_type,
                    provider.as_ref(),
                    &m_resources,
                    &mut remaining_db,
                    &sc_resources,
                    &abort_ids,
                )
                .await?;
            let extra_jobs = self
                .audit_find_extra(&resource_type, &remaining_db, &sc_resources, &abort_ids)
                .await?;

            let jobs = missing_jobs + extra_jobs;
            if jobs == 0 {
                info!(resource_type = %resource_type, "clean audit run");
            } else {
                info!(resource_type = %resource_type, jobs, "audit jobs scheduled");
            }
            total_jobs += jobs;
        }

        if total_jobs > 0 {
            self.bus.publish(ControlPlaneEvent::AuditRequested {
                at: Utc::now(),
                request_id: uuid::Uuid::new_v4(),
                subcloud_id: Some(self.subcloud_id),
            });
        }

        info!("done sync audit");
        self.post_audit().await;
        Ok(())
    }

    /// Resets the cached master-resource dict under the cache's own lock
    /// (the `AuditLock` analog). Runs once per `sync_audit` pass regardless
    /// of whether any audit jobs were found.
    pub async fn post_audit(&self) {
        self.cache.reset().await;
    }

    async fn pending_sync_requests(&self, resource_type: &str) -> Result<Vec<OrchRequest>, SyncError> {
        let all = self.store.list_orch_requests(self.subcloud_id).await?;
        Ok(all
            .into_iter()
            .filter(|r| {
                r.endpoint_type == self.endpoint_type
                    && r.resource_type == resource_type
                    && matches!(r.state, OrchRequestState::Queued | OrchRequestState::InProgress)
            })
            .collect())
    }

    /// For each master resource, determine whether the subcloud already has
    /// a matching, managed, in-sync copy; if not, schedule a create. Removes
    /// matched entries from `db_resources` as it goes, leaving only rows with
    /// no master counterpart (used by `audit_find_extra`).
    ///
    /// Before scheduling a create for a resource with no tracked mapping yet,
    /// gives `provider` a chance to recognize an already-present subcloud
    /// resource as this master resource's counterpart under a different local
    /// identifier and adopt it instead, mirroring `sync_thread.py`'s
    /// `map_subcloud_resource` hook in `audit_find_missing`.
    async fn audit_find_missing(
        &self,
        resource_type: &str,
        provider: &dyn ResourceProvider,
        m_resources: &[MasterResource],
        db_resources: &mut Vec<Resource>,
        sc_resources: &[ObservedResource],
        abort_ids: &[String],
    ) -> Result<usize, SyncError> {
        let mut jobs = 0usize;

        for m in m_resources {
            if abort_ids.contains(&m.master_id) {
                jobs += 1;
                continue;
            }

            let db_idx = db_resources.iter().position(|r| r.master_id == m.master_id);
            let db_row = db_idx.map(|i| db_resources.remove(i));

            let mut missing = false;
            match db_row {
                Some(row) => {
                    let mapping = self.store.get_subcloud_resource(row.id, self.subcloud_id).await?;
                    match mapping {
                        Some(mapping) => {
                            if !mapping.managed {
                                debug!(master_id = %m.master_id, "resource is not managed, skipping");
                                continue;
                            }
                            let observed = mapping
                                .subcloud_resource_id
                                .as_ref()
                                .and_then(|id| sc_resources.iter().find(|sc| &sc.subcloud_resource_id == id));
                            match observed {
                                Some(sc) if sc.data == m.data => {
                                    debug!(master_id = %m.master_id, "in sync");
                                }
                                _ => missing = true,
                            }
                        }
                        None => {
                            if self.adopt_existing(resource_type, row.id, m, provider, sc_resources).await? {
                                continue;
                            }
                            missing = true;
                        }
                    }
                }
                None => {
                    let row = Resource {
                        id: uuid::Uuid::new_v4(),
                        resource_type: resource_type.to_string(),
                        master_id: m.master_id.clone(),
                        data: m.data.clone(),
                    };
                    if self.adopt_existing(resource_type, row.id, m, provider, sc_resources).await? {
                        self.store.upsert_resource(row).await?;
                        continue;
                    }
                    missing = true;
                }
            }

            if missing {
                jobs += self.schedule(resource_type, &m.master_id, Operation::Create).await?;
            }
        }

        Ok(jobs)
    }

    /// Asks `provider` whether a live subcloud resource should be adopted as
    /// `resource_id`'s counterpart; if so, persists a managed mapping and
    /// returns `true`. `resource_id` names a `Resource` row that must already
    /// exist in the store by the time this returns `true` — callers that pass
    /// a not-yet-persisted id are responsible for upserting it themselves.
    async fn adopt_existing(
        &self,
        resource_type: &str,
        resource_id: uuid::Uuid,
        master: &MasterResource,
        provider: &dyn ResourceProvider,
        sc_resources: &[ObservedResource],
    ) -> Result<bool, SyncError> {
        let Some(subcloud_resource_id) = provider
            .find_existing_subcloud_resource(resource_type, master, sc_resources)
            .await?
        else {
            return Ok(false);
        };

        info!(master_id = %master.master_id, %subcloud_resource_id, "adopting existing subcloud resource");
        self.store
            .upsert_subcloud_resource(SubcloudResource {
                resource_id,
                subcloud_id: self.subcloud_id,
                subcloud_resource_id: Some(subcloud_resource_id),
                managed: true,
            })
            .await?;
        Ok(true)
    }

    /// Remaining `db_resources` have no master-side counterpart. If they are
    /// still mapped to a live subcloud resource, schedule a delete.
    async fn audit_find_extra(
        &self,
        resource_type: &str,
        db_resources: &[Resource],
        sc_resources: &[ObservedResource],
        abort_ids: &[String],
    ) -> Result<usize, SyncError> {
        let mut jobs = 0usize;

        for row in db_resources {
            if abort_ids.contains(&row.master_id) {
                jobs += 1;
                continue;
            }

            let mapping: Option<SubcloudResource> = self.store.get_subcloud_resource(row.id, self.subcloud_id).await?;
            let Some(mapping) = mapping else {
                continue;
            };
            if !mapping.managed {
                continue;
            }
            let still_present = mapping
                .subcloud_resource_id
                .as_ref()
                .map(|id| sc_resources.iter().any(|sc| &sc.subcloud_resource_id == id))
                .unwrap_or(false);
            if !still_present {
                continue;
            }

            jobs += self.schedule(resource_type, &row.master_id, Operation::Delete).await?;
        }

        Ok(jobs)
    }

    async fn schedule(&self, resource_type: &str, source_resource_id: &str, operation: Operation) -> Result<usize, SyncError> {
        info!(resource_type = %resource_type, %source_resource_id, ?operation, "scheduling resource sync work");
        let req = OrchRequest::new(
            self.subcloud_id,
            self.endpoint_type,
            resource_type,
            source_resource_id,
            operation,
            Utc::now(),
        );
        self.store.create_orch_request(req).await?;
        Ok(1)
    }
}

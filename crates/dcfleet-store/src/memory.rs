use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use dcfleet_domain::{
    DomainError, EndpointType, GroupId, OrchRequest, Resource, StrategyStep, Subcloud,
    SubcloudGroup, SubcloudId, SubcloudResource, SubcloudStatus, SwUpdateStrategy, SyncStatus,
};

use crate::error::StoreError;
use crate::store::ControlPlaneStore;

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<GroupId, SubcloudGroup>,
    subclouds: HashMap<SubcloudId, Subcloud>,
    statuses: HashMap<(SubcloudId, EndpointType), SubcloudStatus>,
    strategy: Option<SwUpdateStrategy>,
    steps: HashMap<Option<SubcloudId>, StrategyStep>,
    orch_requests: HashMap<Uuid, OrchRequest>,
    resources: HashMap<Uuid, Resource>,
    subcloud_resources: HashMap<(Uuid, SubcloudId), SubcloudResource>,
}

/// In-memory implementation of [`ControlPlaneStore`].
///
/// All data is lost on process exit. The only backing store this core
/// ships — a real persistence layer is out of scope.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the Default group (id=1), matching the original's bootstrap
    /// behavior of always having exactly one undeletable default group.
    pub async fn with_default_group(self) -> Self {
        let mut guard = self.inner.write().await;
        guard
            .groups
            .entry(dcfleet_domain::DEFAULT_GROUP_ID)
            .or_insert_with(SubcloudGroup::default_group);
        drop(guard);
        self
    }
}

#[async_trait]
impl ControlPlaneStore for InMemoryStore {
    async fn list_groups(&self) -> Result<Vec<SubcloudGroup>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.groups.values().cloned().collect())
    }

    async fn get_group(&self, id: GroupId) -> Result<Option<SubcloudGroup>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.groups.get(&id).cloned())
    }

    async fn create_group(&self, group: SubcloudGroup) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.groups.insert(group.id, group);
        Ok(())
    }

    async fn update_group(&self, group: SubcloudGroup) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if !guard.groups.contains_key(&group.id) {
            return Err(StoreError::GroupNotFound(group.id.0));
        }
        guard.groups.insert(group.id, group);
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), StoreError> {
        let group = {
            let guard = self.inner.read().await;
            guard.groups.get(&id).cloned()
        };
        match group {
            Some(g) => {
                g.ensure_deletable()?;
                self.inner.write().await.groups.remove(&id);
                Ok(())
            }
            None => Err(StoreError::GroupNotFound(id.0)),
        }
    }

    async fn list_subclouds(&self) -> Result<Vec<Subcloud>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.subclouds.values().cloned().collect())
    }

    async fn get_subcloud(&self, id: SubcloudId) -> Result<Option<Subcloud>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.subclouds.get(&id).cloned())
    }

    async fn upsert_subcloud(&self, subcloud: Subcloud) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.subclouds.insert(subcloud.id, subcloud);
        Ok(())
    }

    async fn delete_subcloud(&self, id: SubcloudId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.subclouds.remove(&id);
        Ok(())
    }

    async fn get_endpoint_status(
        &self,
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
    ) -> Result<Option<SubcloudStatus>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.statuses.get(&(subcloud_id, endpoint_type)).cloned())
    }

    async fn list_endpoint_statuses(
        &self,
        subcloud_id: SubcloudId,
    ) -> Result<Vec<SubcloudStatus>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .statuses
            .values()
            .filter(|s| s.subcloud_id == subcloud_id)
            .cloned()
            .collect())
    }

    async fn set_endpoint_status(
        &self,
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
        sync_status: SyncStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut guard = self.inner.write().await;
        let key = (subcloud_id, endpoint_type);
        if let Some(existing) = guard.statuses.get(&key) {
            if existing.should_suppress_write(sync_status, now) {
                return Ok(false);
            }
        }
        guard.statuses.insert(
            key,
            SubcloudStatus {
                subcloud_id,
                endpoint_type,
                sync_status,
                reported_at: now,
            },
        );
        Ok(true)
    }

    async fn get_active_strategy(&self) -> Result<Option<SwUpdateStrategy>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.strategy.clone())
    }

    async fn create_strategy(&self, strategy: SwUpdateStrategy) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if guard.strategy.is_some() {
            return Err(StoreError::Domain(DomainError::StrategyAlreadyExists));
        }
        guard.strategy = Some(strategy);
        Ok(())
    }

    async fn update_strategy(&self, strategy: SwUpdateStrategy) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if guard.strategy.is_none() {
            return Err(StoreError::NoActiveStrategy);
        }
        guard.strategy = Some(strategy);
        Ok(())
    }

    async fn delete_strategy(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.strategy = None;
        guard.steps.clear();
        Ok(())
    }

    async fn list_steps(&self) -> Result<Vec<StrategyStep>, StoreError> {
        let guard = self.inner.read().await;
        let mut steps: Vec<StrategyStep> = guard.steps.values().cloned().collect();
        steps.sort_by_key(|s| s.stage);
        Ok(steps)
    }

    async fn get_step(&self, subcloud_id: Option<SubcloudId>) -> Result<Option<StrategyStep>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.steps.get(&subcloud_id).cloned())
    }

    async fn put_steps(&self, steps: Vec<StrategyStep>) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.steps.clear();
        for step in steps {
            guard.steps.insert(step.subcloud_id, step);
        }
        Ok(())
    }

    async fn update_step(&self, step: StrategyStep) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.steps.insert(step.subcloud_id, step);
        Ok(())
    }

    async fn create_orch_request(&self, req: OrchRequest) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.orch_requests.insert(req.id, req);
        Ok(())
    }

    async fn get_orch_request(&self, id: Uuid) -> Result<Option<OrchRequest>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.orch_requests.get(&id).cloned())
    }

    async fn list_orch_requests(&self, subcloud_id: SubcloudId) -> Result<Vec<OrchRequest>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .orch_requests
            .values()
            .filter(|r| r.subcloud_id == subcloud_id && r.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn update_orch_request(&self, req: OrchRequest) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        if !guard.orch_requests.contains_key(&req.id) {
            return Err(StoreError::OrchRequestNotFound(req.id));
        }
        guard.orch_requests.insert(req.id, req);
        Ok(())
    }

    async fn delete_orch_request(&self, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.orch_requests.remove(&id);
        Ok(())
    }

    async fn upsert_resource(&self, resource: Resource) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.resources.insert(resource.id, resource);
        Ok(())
    }

    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.resources.get(&id).cloned())
    }

    async fn list_resources(&self, resource_type: &str) -> Result<Vec<Resource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .cloned()
            .collect())
    }

    async fn upsert_subcloud_resource(&self, mapping: SubcloudResource) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard
            .subcloud_resources
            .insert((mapping.resource_id, mapping.subcloud_id), mapping);
        Ok(())
    }

    async fn get_subcloud_resource(
        &self,
        resource_id: Uuid,
        subcloud_id: SubcloudId,
    ) -> Result<Option<SubcloudResource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .subcloud_resources
            .get(&(resource_id, subcloud_id))
            .cloned())
    }

    async fn list_subcloud_resources(
        &self,
        subcloud_id: SubcloudId,
    ) -> Result<Vec<SubcloudResource>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .subcloud_resources
            .values()
            .filter(|m| m.subcloud_id == subcloud_id)
            .cloned()
            .collect())
    }
}

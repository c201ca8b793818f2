use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use dcfleet_domain::{
    EndpointType, GroupId, OrchRequest, Resource, StrategyStep, Subcloud, SubcloudGroup,
    SubcloudId, SubcloudResource, SubcloudStatus, SwUpdateStrategy, SyncStatus,
};

use crate::error::StoreError;

/// The data-store gateway: everything the orchestrator, audit, and sync
/// engines need to persist and query. Exactly one backing implementation is
/// provided here (`InMemoryStore`); a real persistence layer is out of scope.
#[async_trait]
pub trait ControlPlaneStore: Send + Sync + 'static {
    // ── Groups ───────────────────────────────────────────────────────────
    async fn list_groups(&self) -> Result<Vec<SubcloudGroup>, StoreError>;
    async fn get_group(&self, id: GroupId) -> Result<Option<SubcloudGroup>, StoreError>;
    async fn create_group(&self, group: SubcloudGroup) -> Result<(), StoreError>;
    async fn update_group(&self, group: SubcloudGroup) -> Result<(), StoreError>;
    async fn delete_group(&self, id: GroupId) -> Result<(), StoreError>;

    // ── Subclouds ────────────────────────────────────────────────────────
    async fn list_subclouds(&self) -> Result<Vec<Subcloud>, StoreError>;
    async fn get_subcloud(&self, id: SubcloudId) -> Result<Option<Subcloud>, StoreError>;
    async fn upsert_subcloud(&self, subcloud: Subcloud) -> Result<(), StoreError>;
    async fn delete_subcloud(&self, id: SubcloudId) -> Result<(), StoreError>;

    // ── Endpoint status (debounced writes) ───────────────────────────────
    async fn get_endpoint_status(
        &self,
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
    ) -> Result<Option<SubcloudStatus>, StoreError>;

    async fn list_endpoint_statuses(
        &self,
        subcloud_id: SubcloudId,
    ) -> Result<Vec<SubcloudStatus>, StoreError>;

    /// Writes `sync_status` for `(subcloud_id, endpoint_type)` unless it is
    /// unchanged and within the debounce window, in which case the write is
    /// suppressed. Returns `true` iff a write actually happened.
    async fn set_endpoint_status(
        &self,
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
        sync_status: SyncStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    // ── Strategy (at most one active at a time) ──────────────────────────
    async fn get_active_strategy(&self) -> Result<Option<SwUpdateStrategy>, StoreError>;
    async fn create_strategy(&self, strategy: SwUpdateStrategy) -> Result<(), StoreError>;
    async fn update_strategy(&self, strategy: SwUpdateStrategy) -> Result<(), StoreError>;
    async fn delete_strategy(&self) -> Result<(), StoreError>;

    // ── Strategy steps ────────────────────────────────────────────────────
    async fn list_steps(&self) -> Result<Vec<StrategyStep>, StoreError>;
    async fn get_step(&self, subcloud_id: Option<SubcloudId>) -> Result<Option<StrategyStep>, StoreError>;
    async fn put_steps(&self, steps: Vec<StrategyStep>) -> Result<(), StoreError>;
    async fn update_step(&self, step: StrategyStep) -> Result<(), StoreError>;

    // ── Orch requests (resource sync queue) ───────────────────────────────
    async fn create_orch_request(&self, req: OrchRequest) -> Result<(), StoreError>;
    async fn get_orch_request(&self, id: Uuid) -> Result<Option<OrchRequest>, StoreError>;
    async fn list_orch_requests(&self, subcloud_id: SubcloudId) -> Result<Vec<OrchRequest>, StoreError>;
    async fn update_orch_request(&self, req: OrchRequest) -> Result<(), StoreError>;
    async fn delete_orch_request(&self, id: Uuid) -> Result<(), StoreError>;

    // ── Resources ─────────────────────────────────────────────────────────
    async fn upsert_resource(&self, resource: Resource) -> Result<(), StoreError>;
    async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>, StoreError>;
    async fn list_resources(&self, resource_type: &str) -> Result<Vec<Resource>, StoreError>;

    async fn upsert_subcloud_resource(&self, mapping: SubcloudResource) -> Result<(), StoreError>;
    async fn get_subcloud_resource(
        &self,
        resource_id: Uuid,
        subcloud_id: SubcloudId,
    ) -> Result<Option<SubcloudResource>, StoreError>;
    async fn list_subcloud_resources(
        &self,
        subcloud_id: SubcloudId,
    ) -> Result<Vec<SubcloudResource>, StoreError>;
}

use async_trait::async_trait;

use dcfleet_domain::SubcloudId;
use dcfleet_driver::DriverError;

/// A resource as seen in the master region, keyed by its master-side id.
/// Generalizes the original's untyped master-cloud resource objects
/// (`get_master_resources`) to a uniform shape the differential audit can
/// compare without knowing the resource-type's concrete schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterResource {
    pub master_id: String,
    pub data: serde_json::Value,
}

/// A resource as observed directly in a subcloud (not the dcorch-tracked
/// mapping — the live object `get_subcloud_resources` would return).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedResource {
    pub subcloud_resource_id: String,
    pub data: serde_json::Value,
}

/// Fetches the master and subcloud sides of a differential audit for one
/// resource type. Implementations live behind this trait because the real
/// fetch is resource-type specific (OpenStack compute flavors, network
/// segments, identity projects, ...); this crate only implements the
/// reconciliation algorithm that runs on top.
#[async_trait]
pub trait ResourceProvider: Send + Sync + 'static {
    async fn fetch_master_resources(&self, resource_type: &str) -> Result<Vec<MasterResource>, DriverError>;

    /// `Ok(None)` means the subcloud could not be reached for this resource
    /// type; callers must abort the audit for it rather than treat it as an
    /// empty resource set.
    async fn fetch_subcloud_resources(
        &self,
        subcloud: SubcloudId,
        resource_type: &str,
    ) -> Result<Option<Vec<ObservedResource>>, DriverError>;

    /// Called before the audit declares a master resource "missing" on the
    /// subcloud side, when no existing mapping row has tracked it yet.
    /// Resource types that can recognize a subcloud resource as the same
    /// underlying object under a different local identifier (matching on a
    /// stable name or UUID embedded in the resource data, say) override this
    /// to return that resource's `subcloud_resource_id` instead of letting
    /// the audit schedule a duplicate create. The default never adopts.
    async fn find_existing_subcloud_resource(
        &self,
        _resource_type: &str,
        _master: &MasterResource,
        _sc_resources: &[ObservedResource],
    ) -> Result<Option<String>, DriverError> {
        Ok(None)
    }
}

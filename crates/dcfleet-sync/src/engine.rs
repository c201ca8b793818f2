use std::collections::HashMap;
use std::sync::Arc;

use dcfleet_domain::{EndpointType, SubcloudId};
use dcfleet_messaging::EventBus;
use dcfleet_store::ControlPlaneStore;

use crate::cache::MasterResourceCache;
use crate::handler::ResourceSyncHandler;
use crate::resource::ResourceProvider;

/// One worker's worth of state for a (subcloud, endpoint-type) resource sync
/// target. Mirrors the original's per-thread `SyncThread` instance: created
/// once the subcloud's initial sync completes and torn down when the
/// subcloud-sync row for this target disappears (that lifecycle lives in the
/// scheduler that owns this engine, via `RegionWorkerPool`).
pub struct SyncEngine {
    pub(crate) subcloud_id: SubcloudId,
    pub(crate) endpoint_type: EndpointType,
    pub(crate) store: Arc<dyn ControlPlaneStore>,
    pub(crate) bus: EventBus,
    pub(crate) cache: MasterResourceCache,
    pub(crate) handlers: HashMap<String, Arc<dyn ResourceSyncHandler>>,
    pub(crate) providers: HashMap<String, Arc<dyn ResourceProvider>>,
    pub(crate) audit_resource_types: Vec<String>,
}

impl SyncEngine {
    pub fn new(
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
        store: Arc<dyn ControlPlaneStore>,
        bus: EventBus,
        cache: MasterResourceCache,
        audit_resource_types: Vec<String>,
    ) -> Self {
        SyncEngine {
            subcloud_id,
            endpoint_type,
            store,
            bus,
            cache,
            handlers: HashMap::new(),
            audit_resource_types,
            providers: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, resource_type: impl Into<String>, handler: Arc<dyn ResourceSyncHandler>) {
        self.handlers.insert(resource_type.into(), handler);
    }

    pub fn register_provider(&mut self, resource_type: impl Into<String>, provider: Arc<dyn ResourceProvider>) {
        self.providers.insert(resource_type.into(), provider);
    }
}

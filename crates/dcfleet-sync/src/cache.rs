use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use dcfleet_driver::DriverError;

use crate::resource::{MasterResource, ResourceProvider};

/// Process-wide cache of master-region resources, keyed by resource type.
/// The single internal mutex doubles as the original's `AUDIT_LOCK_NAME`:
/// it serializes both cache population (`get_or_fetch`) and the `reset`
/// called from `post_audit`, so a reset can never interleave with a
/// concurrent fetch for the same type.
#[derive(Clone, Default)]
pub struct MasterResourceCache {
    inner: Arc<Mutex<HashMap<String, Vec<MasterResource>>>>,
}

impl MasterResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `resource_type`, fetching and populating
    /// it via `provider` on a miss.
    pub async fn get_or_fetch(
        &self,
        resource_type: &str,
        provider: &dyn ResourceProvider,
    ) -> Result<Vec<MasterResource>, DriverError> {
        let mut guard = self.inner.lock().await;
        if let Some(cached) = guard.get(resource_type) {
            return Ok(cached.clone());
        }
        let fetched = provider.fetch_master_resources(resource_type).await?;
        guard.insert(resource_type.to_string(), fetched.clone());
        Ok(fetched)
    }

    /// Clears every cached resource type. Called once per sync-audit pass
    /// after all resource types have been audited.
    pub async fn reset(&self) {
        debug!("resetting cached master resources");
        self.inner.lock().await.clear();
    }
}

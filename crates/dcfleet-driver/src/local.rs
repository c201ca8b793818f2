use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use dcfleet_domain::SubcloudId;

use crate::driver::{
    Alarm, AuthToken, FmClient, IdentityClient, KubeUpgradeRecord, KubeVersion, PatchRecord,
    PatchingClient, SysinvClient, SystemInfo, VimClient, VimStrategyPhase, VimStrategyStatus,
};
use crate::error::DriverError;

/// A stub capability driver that simulates a fleet of healthy subclouds
/// locally. Produces synthetic responses, performs no real I/O. Tests mark
/// individual subclouds unreachable via [`LocalCapabilityDriver::set_unreachable`].
#[derive(Debug, Default)]
pub struct LocalCapabilityDriver {
    unreachable: Mutex<HashSet<SubcloudId>>,
}

impl LocalCapabilityDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, subcloud: SubcloudId, unreachable: bool) {
        let mut guard = self.unreachable.lock().expect("lock poisoned");
        if unreachable {
            guard.insert(subcloud);
        } else {
            guard.remove(&subcloud);
        }
    }

    fn check_reachable(&self, subcloud: SubcloudId) -> Result<(), DriverError> {
        if self.unreachable.lock().expect("lock poisoned").contains(&subcloud) {
            return Err(DriverError::Unreachable(subcloud));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityClient for LocalCapabilityDriver {
    async fn get_token(&self, subcloud: SubcloudId) -> Result<AuthToken, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, "LocalCapabilityDriver: get_token");
        let now = Utc::now();
        Ok(AuthToken {
            value: format!("local-token-{subcloud}"),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(3600),
        })
    }

    async fn renew_if_needed(
        &self,
        subcloud: SubcloudId,
        token: AuthToken,
        now: chrono::DateTime<Utc>,
    ) -> Result<AuthToken, DriverError> {
        self.check_reachable(subcloud)?;
        if token.is_expiring_soon(now, 300, 480, 20) {
            self.get_token(subcloud).await
        } else {
            Ok(token)
        }
    }
}

#[async_trait]
impl SysinvClient for LocalCapabilityDriver {
    async fn get_system_info(&self, subcloud: SubcloudId) -> Result<SystemInfo, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, "LocalCapabilityDriver: get_system_info");
        Ok(SystemInfo {
            software_version: "22.12".to_string(),
            management_state_reported: "managed".to_string(),
            service_groups_healthy: true,
            openstack_active: false,
        })
    }

    async fn get_controller_system_info(&self) -> Result<SystemInfo, DriverError> {
        debug!("LocalCapabilityDriver: get_controller_system_info");
        Ok(SystemInfo {
            software_version: "22.12".to_string(),
            management_state_reported: "managed".to_string(),
            service_groups_healthy: true,
            openstack_active: false,
        })
    }

    async fn get_controller_kube_versions(&self) -> Result<Vec<KubeVersion>, DriverError> {
        debug!("LocalCapabilityDriver: get_controller_kube_versions");
        Ok(vec![])
    }

    async fn get_kube_versions(&self, subcloud: SubcloudId) -> Result<Vec<KubeVersion>, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, "LocalCapabilityDriver: get_kube_versions");
        Ok(vec![])
    }

    async fn get_kube_upgrades(&self, subcloud: SubcloudId) -> Result<Vec<KubeUpgradeRecord>, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, "LocalCapabilityDriver: get_kube_upgrades");
        Ok(vec![])
    }
}

#[async_trait]
impl PatchingClient for LocalCapabilityDriver {
    async fn query_patches(&self, subcloud: SubcloudId) -> Result<Vec<PatchRecord>, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, "LocalCapabilityDriver: query_patches");
        Ok(vec![])
    }

    async fn query_master_patches(&self) -> Result<Vec<PatchRecord>, DriverError> {
        debug!("LocalCapabilityDriver: query_master_patches");
        Ok(vec![])
    }
}

#[async_trait]
impl VimClient for LocalCapabilityDriver {
    async fn create_strategy(
        &self,
        subcloud: SubcloudId,
        strategy_name: &str,
        _extra_args: &serde_json::Value,
    ) -> Result<VimStrategyStatus, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, strategy_name, "LocalCapabilityDriver: create_strategy");
        Ok(VimStrategyStatus {
            phase: VimStrategyPhase::Ready,
            details: String::new(),
        })
    }

    async fn apply_strategy(&self, subcloud: SubcloudId, strategy_name: &str) -> Result<VimStrategyStatus, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, strategy_name, "LocalCapabilityDriver: apply_strategy");
        Ok(VimStrategyStatus {
            phase: VimStrategyPhase::Applied,
            details: String::new(),
        })
    }

    async fn get_strategy_status(&self, subcloud: SubcloudId, strategy_name: &str) -> Result<VimStrategyStatus, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, strategy_name, "LocalCapabilityDriver: get_strategy_status");
        Ok(VimStrategyStatus {
            phase: VimStrategyPhase::Applied,
            details: String::new(),
        })
    }

    async fn delete_strategy(&self, subcloud: SubcloudId, strategy_name: &str) -> Result<(), DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, strategy_name, "LocalCapabilityDriver: delete_strategy");
        Ok(())
    }
}

#[async_trait]
impl FmClient for LocalCapabilityDriver {
    async fn list_active_alarms(&self, subcloud: SubcloudId) -> Result<Vec<Alarm>, DriverError> {
        self.check_reachable(subcloud)?;
        debug!(%subcloud, "LocalCapabilityDriver: list_active_alarms");
        Ok(vec![])
    }
}

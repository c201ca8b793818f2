use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dcfleet_domain::SubcloudId;

use crate::error::DriverError;

/// Default deadline applied to every capability call, matching the
/// original's `EndpointCache.get_admin_session(..., timeout=60)`.
pub const DEFAULT_CALL_DEADLINE_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// True when `now` falls inside a randomized stale window drawn from
    /// `[min, max)` seconds before expiry, stepped by `step` — matching
    /// `dccommon.utils.is_token_expiring_soon`'s jittered early-renewal.
    pub fn is_expiring_soon(&self, now: DateTime<Utc>, min_secs: u64, max_secs: u64, step_secs: u64) -> bool {
        use rand::Rng;
        let steps = ((max_secs.saturating_sub(min_secs)) / step_secs.max(1)).max(1);
        let offset = min_secs + step_secs * rand::thread_rng().gen_range(0..steps);
        let threshold = self.expires_at - chrono::Duration::seconds(offset as i64);
        now >= threshold
    }
}

/// Identity/Keystone-equivalent client: token issuance and renewal for a
/// subcloud's admin session.
#[async_trait]
pub trait IdentityClient: Send + Sync + 'static {
    async fn get_token(&self, subcloud: SubcloudId) -> Result<AuthToken, DriverError>;

    /// Returns `token` unchanged if it is not near expiry; otherwise issues
    /// and returns a fresh one. Must be safe to call repeatedly for the same
    /// subcloud without forcing a fresh issuance each time.
    async fn renew_if_needed(
        &self,
        subcloud: SubcloudId,
        token: AuthToken,
        now: DateTime<Utc>,
    ) -> Result<AuthToken, DriverError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub software_version: String,
    pub management_state_reported: String,
    pub service_groups_healthy: bool,
    /// Whether the stx-openstack application is present and active. Drives
    /// the audit engine's openstack endpoint-type toggle.
    pub openstack_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubeVersionState {
    Available,
    Active,
    Partial,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeVersion {
    pub version: String,
    pub target: bool,
    pub state: KubeVersionState,
}

/// A kube-upgrade record already in progress on a subcloud, per
/// `sysinv.objects.kube_upgrade`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeUpgradeRecord {
    pub to_version: String,
}

/// sysinv-equivalent client: subcloud inventory/health queries used by the
/// audit engine's reachability and software-version checks, plus the
/// kubernetes-version queries the kubernetes strategy pre-check needs.
#[async_trait]
pub trait SysinvClient: Send + Sync + 'static {
    async fn get_system_info(&self, subcloud: SubcloudId) -> Result<SystemInfo, DriverError>;

    /// The system controller's own system info, used as the reference
    /// software-version for the audit engine's load endpoint audit.
    async fn get_controller_system_info(&self) -> Result<SystemInfo, DriverError>;

    /// The system controller's own kube-version inventory, used to derive
    /// the upgrade target when the operator gives no explicit `to-version`.
    async fn get_controller_kube_versions(&self) -> Result<Vec<KubeVersion>, DriverError>;

    async fn get_kube_versions(&self, subcloud: SubcloudId) -> Result<Vec<KubeVersion>, DriverError>;

    async fn get_kube_upgrades(&self, subcloud: SubcloudId) -> Result<Vec<KubeUpgradeRecord>, DriverError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRecord {
    pub patch_id: String,
    pub state: String,
}

/// patching-equivalent client: per-subcloud patch inventory used by the
/// patch audit and patch strategy orchestration.
#[async_trait]
pub trait PatchingClient: Send + Sync + 'static {
    async fn query_patches(&self, subcloud: SubcloudId) -> Result<Vec<PatchRecord>, DriverError>;

    /// The system controller's own patch inventory, used as the
    /// authoritative reference when computing a subcloud's patch delta.
    async fn query_master_patches(&self) -> Result<Vec<PatchRecord>, DriverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VimStrategyPhase {
    Building,
    Ready,
    Applying,
    Applied,
    Aborted,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VimStrategyStatus {
    pub phase: VimStrategyPhase,
    pub details: String,
}

/// VIM (Virtual Infrastructure Manager)-equivalent client: the per-subcloud
/// strategy sub-orchestrator that kubernetes/kube-rootca/firmware strategy
/// steps delegate to once the control plane has decided *what* to apply.
#[async_trait]
pub trait VimClient: Send + Sync + 'static {
    async fn create_strategy(
        &self,
        subcloud: SubcloudId,
        strategy_name: &str,
        extra_args: &serde_json::Value,
    ) -> Result<VimStrategyStatus, DriverError>;

    async fn apply_strategy(&self, subcloud: SubcloudId, strategy_name: &str) -> Result<VimStrategyStatus, DriverError>;

    async fn get_strategy_status(&self, subcloud: SubcloudId, strategy_name: &str) -> Result<VimStrategyStatus, DriverError>;

    async fn delete_strategy(&self, subcloud: SubcloudId, strategy_name: &str) -> Result<(), DriverError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub alarm_id: String,
    pub severity: String,
    pub entity_instance_id: String,
}

/// fm (Fault Management)-equivalent client: active alarm queries used to
/// gate strategy steps that must not proceed while management-affecting
/// alarms are raised.
#[async_trait]
pub trait FmClient: Send + Sync + 'static {
    async fn list_active_alarms(&self, subcloud: SubcloudId) -> Result<Vec<Alarm>, DriverError>;
}

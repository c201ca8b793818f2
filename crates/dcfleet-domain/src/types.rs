use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

// ── Constants ──────────────────────────────────────────────────────────────
//
// Pulled verbatim from `dccommon/consts.py` and `dcorch/engine/sync_thread.py`:
// these names and values are load-bearing for the state machines below, not
// arbitrary defaults.

/// The master region's name. Its step has `subcloud_id = None`.
pub const SYSTEM_CONTROLLER_REGION: &str = "RegionOne";
/// Logical name used to key the SystemController's worker slot.
pub const VIRTUAL_MASTER_CLOUD: &str = "SystemController";

pub const DEFAULT_GROUP_ID: GroupId = GroupId(1);
pub const DEFAULT_GROUP_NAME: &str = "Default";

/// §3: audit-fail-count caps at this value and resets to 0 on success.
pub const MAX_AUDIT_FAIL_COUNT: u32 = 2;
/// §4.4: up to this many attempts per orch request.
pub const MAX_RETRY: u32 = 3;

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubcloudId(pub i64);

impl std::fmt::Display for SubcloudId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Enums ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagementState {
    Managed,
    Unmanaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialSyncState {
    Requested,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyType {
    Serial,
    Parallel,
}

impl std::str::FromStr for ApplyType {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(ApplyType::Serial),
            "parallel" => Ok(ApplyType::Parallel),
            _ => Err(DomainError::InvalidApplyType),
        }
    }
}

/// Endpoint types tracked by `SubcloudStatus`. The `Openstack*` variants
/// appear/disappear with a subcloud's `openstack_installed` flag (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Patching,
    Load,
    Firmware,
    Kubernetes,
    KubeRootca,
    Identity,
    OpenstackCompute,
    OpenstackNetwork,
    OpenstackVolume,
}

impl EndpointType {
    /// The three endpoint types added when `openstack_installed` toggles on,
    /// and removed when it toggles off.
    pub const OPENSTACK: [EndpointType; 3] = [
        EndpointType::OpenstackCompute,
        EndpointType::OpenstackNetwork,
        EndpointType::OpenstackVolume,
    ];

    pub fn is_openstack(&self) -> bool {
        Self::OPENSTACK.contains(self)
    }
}

impl std::fmt::Display for EndpointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndpointType::Patching => "patching",
            EndpointType::Load => "load",
            EndpointType::Firmware => "firmware",
            EndpointType::Kubernetes => "kubernetes",
            EndpointType::KubeRootca => "kube-rootca",
            EndpointType::Identity => "identity",
            EndpointType::OpenstackCompute => "openstack_compute",
            EndpointType::OpenstackNetwork => "openstack_network",
            EndpointType::OpenstackVolume => "openstack_volume",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    InSync,
    OutOfSync,
    Unknown,
    NotAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    Patch,
    Upgrade,
    Firmware,
    Kubernetes,
    KubeRootca,
}

impl StrategyType {
    /// The per-kind state a dispatched step starts in, per spec.md §4.3's
    /// per-kind state machines. `Firmware` and `KubeRootca` are VIM-strategy
    /// kinds like `Kubernetes` but spec.md gives no precheck rules for them,
    /// so they enter the VIM sub-loop directly rather than via
    /// `KubeUpgradePreCheck`.
    pub fn starting_step_state(&self) -> StepState {
        match self {
            StrategyType::Patch => StepState::UpdatingPatches,
            StrategyType::Upgrade => StepState::InstallingLicense,
            StrategyType::Kubernetes => StepState::KubeUpgradePreCheck,
            StrategyType::Firmware | StrategyType::KubeRootca => StepState::KubeCreatingVimKubeUpgradeStrategy,
        }
    }
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StrategyType::Patch => "patch",
            StrategyType::Upgrade => "upgrade",
            StrategyType::Firmware => "firmware",
            StrategyType::Kubernetes => "kubernetes",
            StrategyType::KubeRootca => "kube-rootca",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyState {
    Initial,
    Applying,
    AbortRequested,
    Aborting,
    Aborted,
    Complete,
    Failed,
    Deleting,
}

impl StrategyState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StrategyState::Aborted | StrategyState::Complete | StrategyState::Failed
        )
    }

    /// Valid strategy-level transitions per spec.md §3/§6.
    pub fn can_transition_to(&self, to: StrategyState) -> bool {
        use StrategyState::*;
        matches!(
            (self, to),
            (Initial, Applying)
                | (Applying, AbortRequested)
                | (Applying, Complete)
                | (Applying, Failed)
                | (Applying, Aborting)
                | (AbortRequested, Aborting)
                | (Aborting, Aborted)
                | (Aborting, Failed)
                | (Initial, Deleting)
                | (Complete, Deleting)
                | (Failed, Deleting)
                | (Aborted, Deleting)
        )
    }
}

/// Flat namespace of per-step states, spanning all strategy kinds — mirrors
/// the original's flat `consts.STRATEGY_STATE_*` string constants rather than
/// one enum per kind, since a single `StrategyStep` column holds the state
/// regardless of which kind created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Initial,
    // patch
    UpdatingPatches,
    CreatingStrategy,
    ApplyingStrategy,
    Finishing,
    // upgrade
    InstallingLicense,
    MigratingData,
    ActivatingUpgrade,
    CompletingUpgrade,
    // kubernetes / kube-rootca / firmware (VIM-strategy-driven kinds)
    KubeUpgradePreCheck,
    KubeCreatingVimKubeUpgradeStrategy,
    KubeApplyingVimKubeUpgradeStrategy,
    // terminal
    Complete,
    Failed,
    Aborted,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Complete | StepState::Failed | StepState::Aborted)
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = serde_json::to_value(self).unwrap_or_default();
        write!(f, "{}", v.as_str().unwrap_or("unknown"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchRequestState {
    Queued,
    InProgress,
    Completed,
    Failed,
    TimedOut,
    Aborted,
}

// ── Core structs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcloudGroup {
    pub id: GroupId,
    pub name: String,
    pub update_apply_type: ApplyType,
    pub max_parallel_subclouds: u8,
}

impl SubcloudGroup {
    pub fn default_group() -> Self {
        SubcloudGroup {
            id: DEFAULT_GROUP_ID,
            name: DEFAULT_GROUP_NAME.to_string(),
            update_apply_type: ApplyType::Serial,
            max_parallel_subclouds: 1,
        }
    }

    /// Name must be unique (enforced by the store) and non-numeric;
    /// max_parallel ∈ [1,100].
    pub fn validate_new(name: &str, max_parallel_subclouds: u8) -> Result<(), DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::EmptyGroupName);
        }
        if name.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::NumericGroupName(name.to_string()));
        }
        if !(1..=100).contains(&max_parallel_subclouds) {
            return Err(DomainError::MaxParallelOutOfRange(max_parallel_subclouds));
        }
        Ok(())
    }

    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.id == DEFAULT_GROUP_ID {
            return Err(DomainError::DefaultGroupUndeletable);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcloud {
    pub id: SubcloudId,
    pub name: String,
    pub software_version: String,
    pub deploy_status: String,
    pub management_state: ManagementState,
    pub availability: Availability,
    pub audit_fail_count: u32,
    pub openstack_installed: bool,
    pub group_id: GroupId,
    pub initial_sync_state: InitialSyncState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subcloud {
    pub fn is_managed(&self) -> bool {
        matches!(self.management_state, ManagementState::Managed)
    }

    pub fn is_online(&self) -> bool {
        matches!(self.availability, Availability::Online)
    }

    /// §4.4: "disabled" = not managed, not online, or initial sync incomplete.
    pub fn is_disabled_for_sync(&self) -> bool {
        !self.is_managed()
            || !self.is_online()
            || self.initial_sync_state != InitialSyncState::Completed
    }

    /// Applies one audit tick's reachability outcome to fail-count/availability
    /// per spec.md §4.2. Returns `true` if `self` changed.
    pub fn apply_audit_reachability(&mut self, reachable: bool) -> bool {
        let before = (self.availability, self.audit_fail_count);
        if reachable {
            if matches!(self.availability, Availability::Offline) {
                self.availability = Availability::Online;
            }
            self.audit_fail_count = 0;
        } else {
            self.audit_fail_count = (self.audit_fail_count + 1).min(MAX_AUDIT_FAIL_COUNT);
            if matches!(self.availability, Availability::Online)
                && self.audit_fail_count >= MAX_AUDIT_FAIL_COUNT
            {
                self.availability = Availability::Offline;
            }
        }
        before != (self.availability, self.audit_fail_count)
    }
}

/// (subcloud, endpoint_type) → sync-status, plus the bookkeeping
/// `set_endpoint_status` needs to debounce repeat writes: suppresses a
/// repeat write within the debounce window unless the value changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcloudStatus {
    pub subcloud_id: SubcloudId,
    pub endpoint_type: EndpointType,
    pub sync_status: SyncStatus,
    pub reported_at: DateTime<Utc>,
}

pub const ENDPOINT_STATUS_DEBOUNCE_SECS: i64 = 3600;

impl SubcloudStatus {
    /// True if a write of `new_status` at `now` would be suppressed by the
    /// debounce window, i.e. the store should skip hitting storage.
    pub fn should_suppress_write(&self, new_status: SyncStatus, now: DateTime<Utc>) -> bool {
        if self.sync_status != new_status {
            return false;
        }
        (now - self.reported_at).num_seconds() < ENDPOINT_STATUS_DEBOUNCE_SECS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwUpdateStrategy {
    pub strategy_type: StrategyType,
    pub subcloud_apply_type: ApplyType,
    pub max_parallel_subclouds: u8,
    pub stop_on_failure: bool,
    pub state: StrategyState,
    pub extra_args: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SwUpdateStrategy {
    /// BadRequest validation for strategy creation.
    pub fn validate_new(max_parallel_subclouds: u8) -> Result<(), DomainError> {
        if !(1..=100).contains(&max_parallel_subclouds) {
            return Err(DomainError::MaxParallelOutOfRange(max_parallel_subclouds));
        }
        Ok(())
    }

    pub fn transition(&mut self, to: StrategyState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(to) {
            return Err(DomainError::InvalidStrategyTransition {
                from: format!("{:?}", self.state),
                to: format!("{to:?}"),
            });
        }
        self.state = to;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStep {
    /// `None` identifies the SystemController step.
    pub subcloud_id: Option<SubcloudId>,
    pub stage: u32,
    pub state: StepState,
    pub details: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StrategyStep {
    pub fn new(subcloud_id: Option<SubcloudId>, stage: u32) -> Self {
        StrategyStep {
            subcloud_id,
            stage,
            state: StepState::Initial,
            details: String::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_system_controller(&self) -> bool {
        self.subcloud_id.is_none()
    }

    /// finished_at is set iff the state is terminal; started_at is set on the
    /// first transition out of Initial.
    pub fn apply_transition(&mut self, state: StepState, details: impl Into<String>, now: DateTime<Utc>) {
        if self.started_at.is_none() && !matches!(state, StepState::Initial) {
            self.started_at = Some(now);
        }
        if state.is_terminal() {
            self.finished_at = Some(now);
        }
        self.state = state;
        self.details = details.into();
    }

    /// Region key used by the per-subcloud worker pool: the SystemController
    /// step keys on `VIRTUAL_MASTER_CLOUD` rather than a subcloud name.
    pub fn region_key(&self, subcloud_name: Option<&str>) -> String {
        match subcloud_name {
            Some(name) => name.to_string(),
            None => VIRTUAL_MASTER_CLOUD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchRequest {
    pub id: Uuid,
    pub subcloud_id: SubcloudId,
    pub endpoint_type: EndpointType,
    pub resource_type: String,
    pub source_resource_id: String,
    pub operation: Operation,
    pub state: OrchRequestState,
    pub try_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl OrchRequest {
    pub fn new(
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
        resource_type: impl Into<String>,
        source_resource_id: impl Into<String>,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> Self {
        OrchRequest {
            id: Uuid::new_v4(),
            subcloud_id,
            endpoint_type,
            resource_type: resource_type.into(),
            source_resource_id: source_resource_id.into(),
            operation,
            state: OrchRequestState::Queued,
            try_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// §8 invariant: try_count never exceeds MAX_RETRY.
    pub fn bump_try_count(&mut self, now: DateTime<Utc>) {
        self.try_count = (self.try_count + 1).min(MAX_RETRY);
        self.updated_at = now;
    }
}

/// Master-side canonical resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub resource_type: String,
    pub master_id: String,
    pub data: serde_json::Value,
}

/// Per-subcloud mapping of a master resource to its subcloud identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcloudResource {
    pub resource_id: Uuid,
    pub subcloud_id: SubcloudId,
    pub subcloud_resource_id: Option<String>,
    pub managed: bool,
}

/// Candidate subcloud set for a new strategy: managed ∧ online ∧ endpoint
/// sync-status = out-of-sync. Returns an error if any candidate's status is
/// `unknown` — that's a hard reject, not a skip.
pub fn candidate_subclouds<'a>(
    subclouds: &'a [Subcloud],
    status_for: impl Fn(&Subcloud) -> SyncStatus,
) -> Result<Vec<&'a Subcloud>, DomainError> {
    let mut out = Vec::new();
    for sc in subclouds {
        if !sc.is_managed() || !sc.is_online() {
            continue;
        }
        match status_for(sc) {
            SyncStatus::OutOfSync => out.push(sc),
            SyncStatus::Unknown => return Err(DomainError::UnknownEndpointStatus(sc.name.clone())),
            SyncStatus::InSync | SyncStatus::NotAvailable => {}
        }
    }
    Ok(out)
}

/// Assigns stages: parallel packs into `max_parallel`-sized stages (stage 1
/// reserved for the SystemController step when present); serial puts each
/// subcloud in its own stage. Returns `(subcloud_id, stage)` pairs in
/// assignment order.
pub fn assign_stages(
    subcloud_ids: &[SubcloudId],
    apply_type: ApplyType,
    max_parallel_subclouds: u8,
    include_system_controller: bool,
) -> Vec<(Option<SubcloudId>, u32)> {
    let mut out = Vec::new();
    let mut next_stage = 1u32;

    if include_system_controller {
        out.push((None, next_stage));
        next_stage += 1;
    }

    match apply_type {
        ApplyType::Serial => {
            for id in subcloud_ids {
                out.push((Some(*id), next_stage));
                next_stage += 1;
            }
        }
        ApplyType::Parallel => {
            let chunk = max_parallel_subclouds.max(1) as usize;
            for group in subcloud_ids.chunks(chunk) {
                for id in group {
                    out.push((Some(*id), next_stage));
                }
                next_stage += 1;
            }
        }
    }

    out
}

/// The endpoint-type set that should exist for a subcloud right now, given
/// its `openstack_installed` flag.
pub fn expected_endpoint_types(openstack_installed: bool) -> HashSet<EndpointType> {
    let mut set: HashSet<EndpointType> = [
        EndpointType::Patching,
        EndpointType::Load,
        EndpointType::Firmware,
        EndpointType::Kubernetes,
        EndpointType::KubeRootca,
        EndpointType::Identity,
    ]
    .into_iter()
    .collect();
    if openstack_installed {
        set.extend(EndpointType::OPENSTACK);
    }
    set
}

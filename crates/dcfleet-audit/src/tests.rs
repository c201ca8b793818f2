use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use dcfleet_domain::{
    Availability, GroupId, InitialSyncState, ManagementState, Subcloud, SubcloudId, SyncStatus,
};
use dcfleet_driver::{
    Alarm, DriverError, FmClient, KubeUpgradeRecord, KubeVersion, KubeVersionState, PatchRecord,
    PatchingClient, SysinvClient, SystemInfo,
};
use dcfleet_messaging::EventBus;
use dcfleet_store::{ControlPlaneStore, InMemoryStore};

use crate::engine::AuditEngine;

fn subcloud(availability: Availability, audit_fail_count: u32, openstack_installed: bool) -> Subcloud {
    let now = Utc::now();
    Subcloud {
        id: SubcloudId(1),
        name: "sc1".into(),
        software_version: "22.12".into(),
        deploy_status: "complete".into(),
        management_state: ManagementState::Managed,
        availability,
        audit_fail_count,
        openstack_installed,
        group_id: GroupId(1),
        initial_sync_state: InitialSyncState::Completed,
        created_at: now,
        updated_at: now,
    }
}

struct FakeSysinv {
    healthy: AtomicBool,
    openstack_active: AtomicBool,
    fail: AtomicBool,
    subcloud_version: std::sync::Mutex<String>,
    controller_version: std::sync::Mutex<String>,
    subcloud_kube: std::sync::Mutex<Vec<KubeVersion>>,
    controller_kube: std::sync::Mutex<Vec<KubeVersion>>,
    kube_upgrades: std::sync::Mutex<Vec<KubeUpgradeRecord>>,
}

impl FakeSysinv {
    fn new(healthy: bool) -> Self {
        FakeSysinv {
            healthy: AtomicBool::new(healthy),
            openstack_active: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            subcloud_version: std::sync::Mutex::new("22.12".into()),
            controller_version: std::sync::Mutex::new("22.12".into()),
            subcloud_kube: std::sync::Mutex::new(vec![]),
            controller_kube: std::sync::Mutex::new(vec![]),
            kube_upgrades: std::sync::Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl SysinvClient for FakeSysinv {
    async fn get_system_info(&self, subcloud: SubcloudId) -> Result<SystemInfo, DriverError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DriverError::Unreachable(subcloud));
        }
        Ok(SystemInfo {
            software_version: self.subcloud_version.lock().unwrap().clone(),
            management_state_reported: "managed".into(),
            service_groups_healthy: self.healthy.load(Ordering::SeqCst),
            openstack_active: self.openstack_active.load(Ordering::SeqCst),
        })
    }

    async fn get_controller_system_info(&self) -> Result<SystemInfo, DriverError> {
        Ok(SystemInfo {
            software_version: self.controller_version.lock().unwrap().clone(),
            management_state_reported: "managed".into(),
            service_groups_healthy: true,
            openstack_active: false,
        })
    }

    async fn get_controller_kube_versions(&self) -> Result<Vec<KubeVersion>, DriverError> {
        Ok(self.controller_kube.lock().unwrap().clone())
    }

    async fn get_kube_versions(&self, _subcloud: SubcloudId) -> Result<Vec<KubeVersion>, DriverError> {
        Ok(self.subcloud_kube.lock().unwrap().clone())
    }

    async fn get_kube_upgrades(&self, _subcloud: SubcloudId) -> Result<Vec<KubeUpgradeRecord>, DriverError> {
        Ok(self.kube_upgrades.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakePatching {
    master: std::sync::Mutex<Vec<PatchRecord>>,
    subcloud: std::sync::Mutex<Vec<PatchRecord>>,
}

#[async_trait]
impl PatchingClient for FakePatching {
    async fn query_patches(&self, _subcloud: SubcloudId) -> Result<Vec<PatchRecord>, DriverError> {
        Ok(self.subcloud.lock().unwrap().clone())
    }

    async fn query_master_patches(&self) -> Result<Vec<PatchRecord>, DriverError> {
        Ok(self.master.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeFm {
    alarms: std::sync::Mutex<Vec<Alarm>>,
}

#[async_trait]
impl FmClient for FakeFm {
    async fn list_active_alarms(&self, _subcloud: SubcloudId) -> Result<Vec<Alarm>, DriverError> {
        Ok(self.alarms.lock().unwrap().clone())
    }
}

fn patch(id: &str, state: &str) -> PatchRecord {
    PatchRecord { patch_id: id.into(), state: state.into() }
}

#[tokio::test]
async fn offline_subcloud_transitions_online_on_healthy_audit() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Offline, 2, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );

    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let sc = store.get_subcloud(SubcloudId(1)).await.unwrap().unwrap();
    assert_eq!(sc.availability, Availability::Online);
    assert_eq!(sc.audit_fail_count, 0);
}

#[tokio::test]
async fn online_subcloud_goes_offline_after_max_fail_count() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 1, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(false));
    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );

    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let sc = store.get_subcloud(SubcloudId(1)).await.unwrap().unwrap();
    assert_eq!(sc.availability, Availability::Offline);
    assert_eq!(sc.audit_fail_count, 2);
}

#[tokio::test]
async fn sysinv_error_is_treated_as_unreachable() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    sysinv.fail.store(true, Ordering::SeqCst);
    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );

    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let sc = store.get_subcloud(SubcloudId(1)).await.unwrap().unwrap();
    assert_eq!(sc.availability, Availability::Online);
    assert_eq!(sc.audit_fail_count, 1);
}

#[tokio::test]
async fn offline_subcloud_skips_endpoint_audits() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Offline, 2, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(false));
    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );

    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    assert!(statuses.is_empty());
}

#[tokio::test]
async fn patch_audit_flags_out_of_sync_when_master_has_extra_patch() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    let patching = Arc::new(FakePatching::default());
    *patching.master.lock().unwrap() = vec![patch("PATCH-1", "Applied"), patch("PATCH-2", "Applied")];
    *patching.subcloud.lock().unwrap() = vec![patch("PATCH-1", "Applied")];

    let engine = AuditEngine::new(store.clone(), sysinv, patching, Arc::new(FakeFm::default()), EventBus::new(16));
    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    let patching_status = statuses
        .iter()
        .find(|s| s.endpoint_type == dcfleet_domain::EndpointType::Patching)
        .unwrap();
    assert_eq!(patching_status.sync_status, SyncStatus::OutOfSync);
}

#[tokio::test]
async fn patch_audit_in_sync_when_sets_match_after_filtering_unrelated_states() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    let patching = Arc::new(FakePatching::default());
    *patching.master.lock().unwrap() = vec![patch("PATCH-1", "Committed"), patch("PATCH-2", "Available")];
    *patching.subcloud.lock().unwrap() = vec![patch("PATCH-1", "Committed")];

    let engine = AuditEngine::new(store.clone(), sysinv, patching, Arc::new(FakeFm::default()), EventBus::new(16));
    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    let patching_status = statuses
        .iter()
        .find(|s| s.endpoint_type == dcfleet_domain::EndpointType::Patching)
        .unwrap();
    assert_eq!(patching_status.sync_status, SyncStatus::InSync);
}

#[tokio::test]
async fn load_audit_flags_out_of_sync_on_version_mismatch() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    *sysinv.controller_version.lock().unwrap() = "22.12".into();
    *sysinv.subcloud_version.lock().unwrap() = "21.12".into();

    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );
    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    let load_status = statuses
        .iter()
        .find(|s| s.endpoint_type == dcfleet_domain::EndpointType::Load)
        .unwrap();
    assert_eq!(load_status.sync_status, SyncStatus::OutOfSync);
}

#[tokio::test]
async fn kubernetes_audit_in_sync_when_subcloud_version_is_newer() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    *sysinv.controller_kube.lock().unwrap() =
        vec![KubeVersion { version: "1.2.0".into(), target: true, state: KubeVersionState::Active }];
    *sysinv.subcloud_kube.lock().unwrap() =
        vec![KubeVersion { version: "1.3.0".into(), target: true, state: KubeVersionState::Active }];

    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );
    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    let kube_status = statuses
        .iter()
        .find(|s| s.endpoint_type == dcfleet_domain::EndpointType::Kubernetes)
        .unwrap();
    assert_eq!(kube_status.sync_status, SyncStatus::InSync);
}

#[tokio::test]
async fn kubernetes_audit_out_of_sync_when_subcloud_version_behind() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    *sysinv.controller_kube.lock().unwrap() =
        vec![KubeVersion { version: "1.3.0".into(), target: true, state: KubeVersionState::Active }];
    *sysinv.subcloud_kube.lock().unwrap() =
        vec![KubeVersion { version: "1.2.0".into(), target: true, state: KubeVersionState::Active }];

    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );
    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    let kube_status = statuses
        .iter()
        .find(|s| s.endpoint_type == dcfleet_domain::EndpointType::Kubernetes)
        .unwrap();
    assert_eq!(kube_status.sync_status, SyncStatus::OutOfSync);
}

#[tokio::test]
async fn firmware_audit_out_of_sync_when_fm_reports_matching_alarm() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    let fm = Arc::new(FakeFm::default());
    *fm.alarms.lock().unwrap() = vec![Alarm {
        alarm_id: "300.001".into(),
        severity: "major".into(),
        entity_instance_id: "subsystem=firmware".into(),
    }];

    let engine = AuditEngine::new(store.clone(), sysinv, Arc::new(FakePatching::default()), fm, EventBus::new(16));
    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    let firmware_status = statuses
        .iter()
        .find(|s| s.endpoint_type == dcfleet_domain::EndpointType::Firmware)
        .unwrap();
    assert_eq!(firmware_status.sync_status, SyncStatus::OutOfSync);
}

#[tokio::test]
async fn openstack_flag_toggles_on_when_observed_active() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(Availability::Online, 0, false)).await.unwrap();

    let sysinv = Arc::new(FakeSysinv::new(true));
    sysinv.openstack_active.store(true, Ordering::SeqCst);
    let engine = AuditEngine::new(
        store.clone(),
        sysinv,
        Arc::new(FakePatching::default()),
        Arc::new(FakeFm::default()),
        EventBus::new(16),
    );

    engine.audit_subcloud(SubcloudId(1)).await.unwrap();

    let sc = store.get_subcloud(SubcloudId(1)).await.unwrap().unwrap();
    assert!(sc.openstack_installed);

    let statuses = store.list_endpoint_statuses(SubcloudId(1)).await.unwrap();
    assert!(statuses.iter().any(|s| s.endpoint_type.is_openstack()));
    assert!(statuses
        .iter()
        .filter(|s| s.endpoint_type.is_openstack())
        .all(|s| s.sync_status == SyncStatus::InSync));
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use dcfleet_domain::{Availability, EndpointType, StepState, StrategyState, SubcloudId, SyncStatus};

/// In-process notification fan-in. Published by the orchestrator, audit, and
/// sync engines; consumed by anything reacting to state changes (e.g. the
/// real system's `PatchAuditManager.trigger_audit()` call after a strategy
/// finishes). This is plumbing for a REST/RPC surface, not the surface
/// itself — no network transport lives here.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPlaneEvent {
    StrategyStateChanged {
        at: DateTime<Utc>,
        state: StrategyState,
    },
    StepStateChanged {
        at: DateTime<Utc>,
        subcloud_id: Option<SubcloudId>,
        state: StepState,
    },
    EndpointStatusChanged {
        at: DateTime<Utc>,
        subcloud_id: SubcloudId,
        endpoint_type: EndpointType,
        sync_status: SyncStatus,
    },
    AuditRequested {
        at: DateTime<Utc>,
        request_id: Uuid,
        subcloud_id: Option<SubcloudId>,
    },
    /// Published when a subcloud's computed availability changes, matching
    /// the original's `dcmanager_api.update_subcloud_availability` call out
    /// of the audit manager.
    SubcloudAvailabilityChanged {
        at: DateTime<Utc>,
        subcloud_id: SubcloudId,
        availability: Availability,
        audit_fail_count: u32,
    },
}

impl ControlPlaneEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ControlPlaneEvent::StrategyStateChanged { at, .. }
            | ControlPlaneEvent::StepStateChanged { at, .. }
            | ControlPlaneEvent::EndpointStatusChanged { at, .. }
            | ControlPlaneEvent::AuditRequested { at, .. }
            | ControlPlaneEvent::SubcloudAvailabilityChanged { at, .. } => *at,
        }
    }
}

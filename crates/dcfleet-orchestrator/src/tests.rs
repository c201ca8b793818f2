use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use dcfleet_domain::{
    ApplyType, GroupId, InitialSyncState, ManagementState, StepState, StrategyState, StrategyStep,
    StrategyType, Subcloud, SubcloudId, SwUpdateStrategy,
};
use dcfleet_messaging::EventBus;
use dcfleet_scheduler::RegionWorkerPool;
use dcfleet_store::{ControlPlaneStore, InMemoryStore};

use crate::engine::Orchestrator;
use crate::executor::{StepAdvance, StepExecutor};

fn subcloud(id: i64, managed: bool) -> Subcloud {
    let now = Utc::now();
    Subcloud {
        id: SubcloudId(id),
        name: format!("sc{id}"),
        software_version: "22.12".into(),
        deploy_status: "complete".into(),
        management_state: if managed { ManagementState::Managed } else { ManagementState::Unmanaged },
        availability: dcfleet_domain::Availability::Online,
        audit_fail_count: 0,
        openstack_installed: false,
        group_id: GroupId(1),
        initial_sync_state: InitialSyncState::Completed,
        created_at: now,
        updated_at: now,
    }
}

fn strategy(stop_on_failure: bool) -> SwUpdateStrategy {
    let now = Utc::now();
    SwUpdateStrategy {
        strategy_type: StrategyType::Patch,
        subcloud_apply_type: ApplyType::Serial,
        max_parallel_subclouds: 1,
        stop_on_failure,
        state: StrategyState::Applying,
        extra_args: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

/// Completes in a single `advance` call, regardless of state.
struct ImmediateCompleteExecutor;

#[async_trait]
impl StepExecutor for ImmediateCompleteExecutor {
    async fn advance(
        &self,
        _subcloud_id: SubcloudId,
        _step: &StrategyStep,
        _strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String> {
        Ok((StepState::Complete, "done".to_string()))
    }
}

struct AlwaysFailsExecutor;

#[async_trait]
impl StepExecutor for AlwaysFailsExecutor {
    async fn advance(
        &self,
        _subcloud_id: SubcloudId,
        _step: &StrategyStep,
        _strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String> {
        Err("synthetic failure".to_string())
    }
}

async fn settle(store: &Arc<dyn ControlPlaneStore>, subcloud_id: Option<SubcloudId>) {
    for _ in 0..50 {
        if let Ok(Some(step)) = store.get_step(subcloud_id).await {
            if step.state.is_terminal() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn system_controller_step_completes_without_an_executor() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    let strat = strategy(false);
    store.create_strategy(strat.clone()).await.unwrap();
    store.put_steps(vec![StrategyStep::new(None, 1)]).await.unwrap();

    let orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.tick().await.unwrap();

    let step = store.get_step(None).await.unwrap().unwrap();
    assert_eq!(step.state, StepState::Complete);
}

#[tokio::test]
async fn unmanaged_subcloud_step_fails_immediately() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(1, false)).await.unwrap();
    store.create_strategy(strategy(false)).await.unwrap();
    store.put_steps(vec![StrategyStep::new(Some(SubcloudId(1)), 1)]).await.unwrap();

    let orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.tick().await.unwrap();

    let step = store.get_step(Some(SubcloudId(1))).await.unwrap().unwrap();
    assert_eq!(step.state, StepState::Failed);
    assert!(step.details.contains("unmanaged"));
}

#[tokio::test]
async fn dispatched_step_runs_to_completion_and_strategy_finalizes() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(1, true)).await.unwrap();
    store.create_strategy(strategy(false)).await.unwrap();
    store.put_steps(vec![StrategyStep::new(Some(SubcloudId(1)), 1)]).await.unwrap();

    let mut orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.register_executor(StrategyType::Patch, Arc::new(ImmediateCompleteExecutor));

    orch.tick().await.unwrap();
    settle(&store, Some(SubcloudId(1))).await;

    let step = store.get_step(Some(SubcloudId(1))).await.unwrap().unwrap();
    assert_eq!(step.state, StepState::Complete);

    // next tick sees every step complete and finalizes the strategy
    orch.tick().await.unwrap();
    let strat = store.get_active_strategy().await.unwrap().unwrap();
    assert_eq!(strat.state, StrategyState::Complete);
}

#[tokio::test]
async fn system_controller_failure_fails_strategy_unconditionally() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    let mut sc_step = StrategyStep::new(None, 1);
    sc_step.state = StepState::Failed;
    store.create_strategy(strategy(true)).await.unwrap();
    store.put_steps(vec![sc_step]).await.unwrap();

    let orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.tick().await.unwrap();

    let strat = store.get_active_strategy().await.unwrap().unwrap();
    assert_eq!(strat.state, StrategyState::Failed);
}

#[tokio::test]
async fn stop_on_failure_waits_for_stage_to_settle_before_failing() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(2, true)).await.unwrap();

    let mut failed_step = StrategyStep::new(Some(SubcloudId(1)), 1);
    failed_step.state = StepState::Failed;
    let still_running = StrategyStep::new(Some(SubcloudId(2)), 1);

    store.create_strategy(strategy(true)).await.unwrap();
    store.put_steps(vec![failed_step, still_running]).await.unwrap();

    let mut orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.register_executor(StrategyType::Patch, Arc::new(ImmediateCompleteExecutor));

    // stage 1 has an Initial sibling (subcloud 2); must not fail yet, but
    // should still dispatch that sibling.
    orch.tick().await.unwrap();
    let strat = store.get_active_strategy().await.unwrap().unwrap();
    assert_eq!(strat.state, StrategyState::Applying);

    settle(&store, Some(SubcloudId(2))).await;
    let sibling = store.get_step(Some(SubcloudId(2))).await.unwrap().unwrap();
    assert_eq!(sibling.state, StepState::Complete);

    // now the stage is fully settled (one failed, one complete); next tick fails the strategy
    orch.tick().await.unwrap();
    let strat = store.get_active_strategy().await.unwrap().unwrap();
    assert_eq!(strat.state, StrategyState::Failed);
}

#[tokio::test]
async fn failure_without_stop_on_failure_still_fails_strategy_once_scan_completes() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    let mut failed_step = StrategyStep::new(Some(SubcloudId(1)), 1);
    failed_step.state = StepState::Failed;

    store.create_strategy(strategy(false)).await.unwrap();
    store.put_steps(vec![failed_step]).await.unwrap();

    let orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.tick().await.unwrap();

    let strat = store.get_active_strategy().await.unwrap().unwrap();
    assert_eq!(strat.state, StrategyState::Failed);
}

#[tokio::test]
async fn abort_marks_initial_steps_aborted_and_strategy_aborting() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(1, true)).await.unwrap();
    let mut strat = strategy(false);
    strat.state = StrategyState::AbortRequested;
    store.create_strategy(strat).await.unwrap();
    store.put_steps(vec![StrategyStep::new(Some(SubcloudId(1)), 1)]).await.unwrap();

    let orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.tick().await.unwrap();

    let step = store.get_step(Some(SubcloudId(1))).await.unwrap().unwrap();
    assert_eq!(step.state, StepState::Aborted);
    let strat = store.get_active_strategy().await.unwrap().unwrap();
    assert_eq!(strat.state, StrategyState::Aborting);
}

#[tokio::test]
async fn delete_destroys_strategy_and_steps() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    let mut strat = strategy(false);
    strat.state = StrategyState::Deleting;
    store.create_strategy(strat).await.unwrap();
    store.put_steps(vec![StrategyStep::new(None, 1)]).await.unwrap();

    let orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.tick().await.unwrap();

    assert!(store.get_active_strategy().await.unwrap().is_none());
    assert!(store.list_steps().await.unwrap().is_empty());
}

#[tokio::test]
async fn second_stage_only_dispatches_after_first_stage_completes() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(1, true)).await.unwrap();
    store.upsert_subcloud(subcloud(2, true)).await.unwrap();
    store.create_strategy(strategy(false)).await.unwrap();
    store
        .put_steps(vec![
            StrategyStep::new(Some(SubcloudId(1)), 1),
            StrategyStep::new(Some(SubcloudId(2)), 2),
        ])
        .await
        .unwrap();

    let mut orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.register_executor(StrategyType::Patch, Arc::new(ImmediateCompleteExecutor));

    orch.tick().await.unwrap();
    // stage 2 must still be untouched while stage 1 is in flight
    let stage2 = store.get_step(Some(SubcloudId(2))).await.unwrap().unwrap();
    assert_eq!(stage2.state, StepState::Initial);

    settle(&store, Some(SubcloudId(1))).await;
    orch.tick().await.unwrap();
    settle(&store, Some(SubcloudId(2))).await;

    let stage2 = store.get_step(Some(SubcloudId(2))).await.unwrap().unwrap();
    assert_eq!(stage2.state, StepState::Complete);
}

#[tokio::test]
async fn failing_executor_marks_step_failed_with_error_text() {
    let store: Arc<dyn ControlPlaneStore> = Arc::new(InMemoryStore::new());
    store.upsert_subcloud(subcloud(1, true)).await.unwrap();
    store.create_strategy(strategy(false)).await.unwrap();
    store.put_steps(vec![StrategyStep::new(Some(SubcloudId(1)), 1)]).await.unwrap();

    let mut orch = Orchestrator::new(store.clone(), EventBus::new(16), RegionWorkerPool::new(4));
    orch.register_executor(StrategyType::Patch, Arc::new(AlwaysFailsExecutor));

    orch.tick().await.unwrap();
    settle(&store, Some(SubcloudId(1))).await;

    let step = store.get_step(Some(SubcloudId(1))).await.unwrap().unwrap();
    assert_eq!(step.state, StepState::Failed);
    assert_eq!(step.details, "synthetic failure");
}

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dcfleet_domain::{StepState, StrategyState, StrategyStep, StrategyType, SubcloudId, SwUpdateStrategy};
use dcfleet_messaging::{ControlPlaneEvent, EventBus};
use dcfleet_scheduler::RegionWorkerPool;
use dcfleet_store::ControlPlaneStore;

use crate::error::OrchestratorError;
use crate::executor::StepExecutor;

/// How long a dispatched worker sleeps between [`StepExecutor::advance`]
/// calls once a step has not yet reached a terminal state.
pub const WORKER_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// One long-running loop per active strategy, grounded in
/// `dcmanager/manager/sw_upgrade_orch_thread.py`'s `upgrade_orch` /
/// `apply` / `abort` / `delete`. A single instance serves whichever
/// strategy kind is currently active — it looks up the executor for that
/// kind from [`Orchestrator::register_executor`].
pub struct Orchestrator {
    store: Arc<dyn ControlPlaneStore>,
    bus: EventBus,
    pool: RegionWorkerPool,
    executors: HashMap<StrategyType, Arc<dyn StepExecutor>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ControlPlaneStore>, bus: EventBus, pool: RegionWorkerPool) -> Self {
        Orchestrator { store, bus, pool, executors: HashMap::new() }
    }

    pub fn register_executor(&mut self, kind: StrategyType, executor: Arc<dyn StepExecutor>) {
        self.executors.insert(kind, executor);
    }

    /// One iteration of the main loop (spec.md §4.3: "tick every 10s").
    /// Callers own the sleep between ticks; this makes the tick itself
    /// deterministic and testable without a real clock.
    pub async fn tick(&self) -> Result<(), OrchestratorError> {
        let Some(strategy) = self.store.get_active_strategy().await? else {
            debug!("no active strategy, nothing to do");
            return Ok(());
        };

        match strategy.state {
            StrategyState::Applying | StrategyState::Aborting => self.apply(strategy).await,
            StrategyState::AbortRequested => self.abort(strategy).await,
            StrategyState::Deleting => self.delete().await,
            _ => Ok(()),
        }
    }

    async fn apply(&self, strategy: SwUpdateStrategy) -> Result<(), OrchestratorError> {
        let mut steps = self.store.list_steps().await?;
        steps.sort_by_key(|s| (s.stage, s.subcloud_id));

        let mut current_stage: Option<u32> = None;
        let mut any_failed = false;
        let mut any_aborted = false;

        for step in &steps {
            match step.state {
                StepState::Complete => continue,
                StepState::Aborted => {
                    any_aborted = true;
                    continue;
                }
                StepState::Failed => {
                    any_failed = true;
                    if step.is_system_controller() {
                        return self.finalize(strategy, StrategyState::Failed).await;
                    }
                    if !strategy.stop_on_failure {
                        continue;
                    }
                    // Settled = every step in this stage has reached Complete
                    // or Failed (not merely "terminal" — Aborted doesn't
                    // count, matching the original's work_remaining check).
                    let settled = steps
                        .iter()
                        .filter(|s| s.stage == step.stage)
                        .all(|s| matches!(s.state, StepState::Complete | StepState::Failed));
                    if settled {
                        return self.finalize(strategy, StrategyState::Failed).await;
                    }
                    current_stage = Some(step.stage);
                    break;
                }
                _ => {
                    current_stage = Some(step.stage);
                    break;
                }
            }
        }

        let Some(stage) = current_stage else {
            let final_state = if any_failed {
                StrategyState::Failed
            } else if any_aborted {
                StrategyState::Aborted
            } else {
                StrategyState::Complete
            };
            return self.finalize(strategy, final_state).await;
        };

        let executor = self.executors.get(&strategy.strategy_type).cloned();
        for step in steps.iter().filter(|s| s.stage == stage && s.state == StepState::Initial) {
            self.dispatch_step(step, &strategy, executor.clone()).await?;
        }
        Ok(())
    }

    async fn finalize(&self, mut strategy: SwUpdateStrategy, state: StrategyState) -> Result<(), OrchestratorError> {
        strategy.transition(state)?;
        self.store.update_strategy(strategy.clone()).await?;
        info!(?state, "strategy finalized");
        self.bus
            .publish(ControlPlaneEvent::StrategyStateChanged { at: Utc::now(), state: strategy.state });
        Ok(())
    }

    async fn dispatch_step(
        &self,
        step: &StrategyStep,
        strategy: &SwUpdateStrategy,
        executor: Option<Arc<dyn StepExecutor>>,
    ) -> Result<(), OrchestratorError> {
        let now = Utc::now();

        if step.is_system_controller() {
            let mut s = step.clone();
            s.apply_transition(StepState::Complete, "system controller requires no update".to_string(), now);
            self.update_step(s).await?;
            return Ok(());
        }

        let subcloud_id = step.subcloud_id.expect("non-system-controller step always has a subcloud_id");
        let subcloud = match self.store.get_subcloud(subcloud_id).await? {
            Some(s) => s,
            None => {
                let mut s = step.clone();
                s.apply_transition(StepState::Failed, "subcloud no longer exists".to_string(), now);
                self.update_step(s).await?;
                return Ok(());
            }
        };

        if !subcloud.is_managed() {
            let mut s = step.clone();
            s.apply_transition(StepState::Failed, format!("Subcloud {} is unmanaged", subcloud.name), now);
            self.update_step(s).await?;
            return Ok(());
        }

        let mut s = step.clone();
        s.apply_transition(strategy.strategy_type.starting_step_state(), String::new(), now);
        self.update_step(s).await?;

        let Some(executor) = executor else {
            warn!(kind = %strategy.strategy_type, "no executor registered for this strategy kind, step left dispatched but idle");
            return Ok(());
        };

        let store = self.store.clone();
        let bus = self.bus.clone();
        let strategy = strategy.clone();
        let region = subcloud.name.clone();

        let spawned = self
            .pool
            .spawn(region.clone(), move |cancel| async move {
                run_step_worker(store, bus, executor, subcloud_id, strategy, cancel).await;
            })
            .await;

        if let Err(e) = spawned {
            debug!(region = %region, error = %e, "worker already running for this region");
        }

        Ok(())
    }

    async fn update_step(&self, step: StrategyStep) -> Result<(), OrchestratorError> {
        self.store.update_step(step.clone()).await?;
        self.bus.publish(ControlPlaneEvent::StepStateChanged {
            at: Utc::now(),
            subcloud_id: step.subcloud_id,
            state: step.state,
        });
        Ok(())
    }

    /// spec.md §4.3: mark every step in `initial` as aborted; set strategy
    /// state to `aborting`. Workers already dispatched run to completion.
    async fn abort(&self, mut strategy: SwUpdateStrategy) -> Result<(), OrchestratorError> {
        let steps = self.store.list_steps().await?;
        let now = Utc::now();
        for step in steps.into_iter().filter(|s| s.state == StepState::Initial) {
            let mut s = step;
            s.apply_transition(StepState::Aborted, String::new(), now);
            self.update_step(s).await?;
        }
        strategy.transition(StrategyState::Aborting)?;
        self.store.update_strategy(strategy.clone()).await?;
        self.bus
            .publish(ControlPlaneEvent::StrategyStateChanged { at: now, state: strategy.state });
        Ok(())
    }

    /// spec.md §4.3: only when `state=deleting`; destroy all steps then the
    /// strategy. `InMemoryStore::delete_strategy` already does both in one
    /// call.
    async fn delete(&self) -> Result<(), OrchestratorError> {
        self.store.delete_strategy().await?;
        Ok(())
    }
}

async fn run_step_worker(
    store: Arc<dyn ControlPlaneStore>,
    bus: EventBus,
    executor: Arc<dyn StepExecutor>,
    subcloud_id: SubcloudId,
    strategy: SwUpdateStrategy,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let step = match store.get_step(Some(subcloud_id)).await {
            Ok(Some(step)) => step,
            Ok(None) => return,
            Err(e) => {
                error!(%subcloud_id, error = %e, "failed to load step, abandoning worker");
                return;
            }
        };
        if step.state.is_terminal() {
            return;
        }

        let now = Utc::now();
        let mut next = step.clone();
        match executor.advance(subcloud_id, &step, &strategy).await {
            Ok((state, details)) => next.apply_transition(state, details, now),
            Err(message) => next.apply_transition(StepState::Failed, message, now),
        }

        if let Err(e) = store.update_step(next.clone()).await {
            error!(%subcloud_id, error = %e, "failed to persist step transition, abandoning worker");
            return;
        }
        bus.publish(ControlPlaneEvent::StepStateChanged {
            at: now,
            subcloud_id: next.subcloud_id,
            state: next.state,
        });

        if next.state.is_terminal() {
            return;
        }
        tokio::time::sleep(WORKER_POLL_INTERVAL).await;
    }
}

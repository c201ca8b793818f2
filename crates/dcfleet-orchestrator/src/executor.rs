use async_trait::async_trait;

use dcfleet_domain::{StepState, StrategyStep, SubcloudId, SwUpdateStrategy};

/// New step state plus the human-readable detail to record alongside it.
pub type StepAdvance = (StepState, String);

/// Generalizes the original's `update_subcloud_upgrade` /
/// `do_update_subcloud_upgrade` pair: one `advance` call per worker wakeup,
/// inspecting the step's current state and doing the next unit of work for
/// it. The dispatching worker loop treats any `Err` as an immediate
/// transition to `StepState::Failed` with the error text as `details`,
/// mirroring the original's always-cleanup try/except/finally.
#[async_trait]
pub trait StepExecutor: Send + Sync + 'static {
    async fn advance(
        &self,
        subcloud_id: SubcloudId,
        step: &StrategyStep,
        strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String>;
}

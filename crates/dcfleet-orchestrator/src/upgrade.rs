use std::sync::Arc;

use async_trait::async_trait;

use dcfleet_domain::{StepState, StrategyStep, SubcloudId, SwUpdateStrategy};
use dcfleet_driver::VimClient;

use crate::executor::{StepAdvance, StepExecutor};
use crate::vim_loop::{step_vim_strategy, VimStepNames};

const VIM_STRATEGY_NAME: &str = "sw-upgrade";

fn step_names() -> VimStepNames {
    VimStepNames { creating: StepState::CreatingStrategy, applying: StepState::ApplyingStrategy }
}

/// Drives a subcloud through a software upgrade:
/// `installing_license` → `migrating_data` → `activating_upgrade` →
/// `completing_upgrade` → the VIM sub-loop → `complete`.
///
/// The original's per-subcloud counterpart (`do_update_subcloud_upgrade`)
/// left this sequence as an unimplemented placeholder, and spec.md names
/// the states without giving their internal behavior, so each of the four
/// pre-VIM states is a direct pass-through to the next.
pub struct UpgradeStepExecutor {
    vim: Arc<dyn VimClient>,
}

impl UpgradeStepExecutor {
    pub fn new(vim: Arc<dyn VimClient>) -> Self {
        UpgradeStepExecutor { vim }
    }
}

#[async_trait]
impl StepExecutor for UpgradeStepExecutor {
    async fn advance(
        &self,
        subcloud_id: SubcloudId,
        step: &StrategyStep,
        strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String> {
        match step.state {
            StepState::InstallingLicense => Ok((StepState::MigratingData, "license installed".to_string())),
            StepState::MigratingData => Ok((StepState::ActivatingUpgrade, "data migrated".to_string())),
            StepState::ActivatingUpgrade => Ok((StepState::CompletingUpgrade, "upgrade activated".to_string())),
            StepState::CompletingUpgrade => Ok((StepState::CreatingStrategy, "upgrade completed on subcloud".to_string())),
            StepState::CreatingStrategy | StepState::ApplyingStrategy => {
                step_vim_strategy(
                    self.vim.as_ref(),
                    subcloud_id,
                    VIM_STRATEGY_NAME,
                    &strategy.extra_args,
                    step.state,
                    &step_names(),
                    StepState::Complete,
                )
                .await
            }
            other => Err(format!("upgrade executor received unexpected step state {other:?}")),
        }
    }
}

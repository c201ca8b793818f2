use std::sync::Arc;

use async_trait::async_trait;

use dcfleet_domain::{StepState, StrategyStep, SubcloudId, SwUpdateStrategy};
use dcfleet_driver::VimClient;

use crate::executor::{StepAdvance, StepExecutor};
use crate::vim_loop::{step_vim_strategy, VimStepNames};

/// Firmware and kube-rootca strategies: spec.md groups these with
/// kubernetes as "VIM-strategy-driven kinds" sharing the same step states,
/// but gives no precheck rules for either, so they enter the VIM sub-loop
/// directly.
pub struct VimOnlyStepExecutor {
    vim: Arc<dyn VimClient>,
    strategy_name: &'static str,
}

impl VimOnlyStepExecutor {
    pub fn new(vim: Arc<dyn VimClient>, strategy_name: &'static str) -> Self {
        VimOnlyStepExecutor { vim, strategy_name }
    }
}

fn step_names() -> VimStepNames {
    VimStepNames {
        creating: StepState::KubeCreatingVimKubeUpgradeStrategy,
        applying: StepState::KubeApplyingVimKubeUpgradeStrategy,
    }
}

#[async_trait]
impl StepExecutor for VimOnlyStepExecutor {
    async fn advance(
        &self,
        subcloud_id: SubcloudId,
        step: &StrategyStep,
        strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String> {
        match step.state {
            StepState::KubeCreatingVimKubeUpgradeStrategy | StepState::KubeApplyingVimKubeUpgradeStrategy => {
                step_vim_strategy(
                    self.vim.as_ref(),
                    subcloud_id,
                    self.strategy_name,
                    &strategy.extra_args,
                    step.state,
                    &step_names(),
                    StepState::Complete,
                )
                .await
            }
            other => Err(format!("vim-only executor received unexpected step state {other:?}")),
        }
    }
}

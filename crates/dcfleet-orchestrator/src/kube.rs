use std::sync::Arc;

use async_trait::async_trait;

use dcfleet_domain::{StepState, StrategyStep, SubcloudId, SwUpdateStrategy};
use dcfleet_driver::{SysinvClient, VimClient};

use crate::executor::{StepAdvance, StepExecutor};
use crate::precheck::{kube_pre_check, PreCheckOutcome};
use crate::vim_loop::{step_vim_strategy, VimStepNames};

const VIM_STRATEGY_NAME: &str = "kube-upgrade";

fn step_names() -> VimStepNames {
    VimStepNames {
        creating: StepState::KubeCreatingVimKubeUpgradeStrategy,
        applying: StepState::KubeApplyingVimKubeUpgradeStrategy,
    }
}

/// Drives a subcloud through a kubernetes upgrade: pre-check, then the VIM
/// strategy sub-loop. Grounded in
/// `dcmanager/manager/sw_upgrade_orch_thread.py` for the worker shape and
/// `test_pre_check.py` for the pre-check branch semantics.
pub struct KubeStepExecutor {
    sysinv: Arc<dyn SysinvClient>,
    vim: Arc<dyn VimClient>,
}

impl KubeStepExecutor {
    pub fn new(sysinv: Arc<dyn SysinvClient>, vim: Arc<dyn VimClient>) -> Self {
        KubeStepExecutor { sysinv, vim }
    }
}

#[async_trait]
impl StepExecutor for KubeStepExecutor {
    async fn advance(
        &self,
        subcloud_id: SubcloudId,
        step: &StrategyStep,
        strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String> {
        match step.state {
            StepState::KubeUpgradePreCheck => {
                let existing = self
                    .sysinv
                    .get_kube_upgrades(subcloud_id)
                    .await
                    .map_err(|e| e.to_string())?;
                let extra_target = strategy
                    .extra_args
                    .get("to-version")
                    .and_then(|v| v.as_str());
                let controller_versions = self
                    .sysinv
                    .get_controller_kube_versions()
                    .await
                    .map_err(|e| e.to_string())?;
                let subcloud_versions = self
                    .sysinv
                    .get_kube_versions(subcloud_id)
                    .await
                    .map_err(|e| e.to_string())?;

                match kube_pre_check(existing.first(), extra_target, &controller_versions, &subcloud_versions)? {
                    PreCheckOutcome::Skip => {
                        Ok((StepState::Complete, "already at or past target kube version".to_string()))
                    }
                    PreCheckOutcome::Proceed { target_version } => Ok((
                        StepState::KubeCreatingVimKubeUpgradeStrategy,
                        format!("upgrading to kube version {target_version}"),
                    )),
                }
            }
            StepState::KubeCreatingVimKubeUpgradeStrategy | StepState::KubeApplyingVimKubeUpgradeStrategy => {
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
            other => Err(format!("kubernetes executor received unexpected step state {other:?}")),
        }
    }
}

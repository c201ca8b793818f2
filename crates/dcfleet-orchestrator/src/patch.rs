use std::sync::Arc;

use async_trait::async_trait;

use dcfleet_domain::{StepState, StrategyStep, SubcloudId, SwUpdateStrategy};
use dcfleet_driver::{PatchingClient, VimClient};

use crate::executor::{StepAdvance, StepExecutor};
use crate::vim_loop::{step_vim_strategy, VimStepNames};

const VIM_STRATEGY_NAME: &str = "sw-patch";
const PATCH_STATE_COMMITTED: &str = "Committed";
const PATCH_STATE_UNKNOWN: &str = "Unknown";

fn step_names() -> VimStepNames {
    VimStepNames { creating: StepState::CreatingStrategy, applying: StepState::ApplyingStrategy }
}

/// Drives a subcloud through a patch strategy: patch-delta fatal checks,
/// the VIM sub-loop, then a pass-through `finishing` step. spec.md §4.3
/// gives `updating_patches`'s fatal conditions in full but is silent on
/// what `finishing` itself does, so it is modeled as a direct transition to
/// `complete`.
pub struct PatchStepExecutor {
    patching: Arc<dyn PatchingClient>,
    vim: Arc<dyn VimClient>,
}

impl PatchStepExecutor {
    pub fn new(patching: Arc<dyn PatchingClient>, vim: Arc<dyn VimClient>) -> Self {
        PatchStepExecutor { patching, vim }
    }
}

#[async_trait]
impl StepExecutor for PatchStepExecutor {
    async fn advance(
        &self,
        subcloud_id: SubcloudId,
        step: &StrategyStep,
        strategy: &SwUpdateStrategy,
    ) -> Result<StepAdvance, String> {
        match step.state {
            StepState::UpdatingPatches => {
                let master = self.patching.query_master_patches().await.map_err(|e| e.to_string())?;
                let subcloud = self.patching.query_patches(subcloud_id).await.map_err(|e| e.to_string())?;
                for patch in &subcloud {
                    if patch.state == PATCH_STATE_UNKNOWN {
                        return Err(format!("patch {} is in an unknown state", patch.patch_id));
                    }
                    if patch.state == PATCH_STATE_COMMITTED
                        && !master.iter().any(|m| m.patch_id == patch.patch_id && m.state == PATCH_STATE_COMMITTED)
                    {
                        return Err(format!(
                            "patch {} is committed on the subcloud but not on the system controller",
                            patch.patch_id
                        ));
                    }
                }
                Ok((StepState::CreatingStrategy, "patch delta computed, no fatal conflicts".to_string()))
            }
            StepState::CreatingStrategy | StepState::ApplyingStrategy => {
                step_vim_strategy(
                    self.vim.as_ref(),
                    subcloud_id,
                    VIM_STRATEGY_NAME,
                    &strategy.extra_args,
                    step.state,
                    &step_names(),
                    StepState::Finishing,
                )
                .await
            }
            StepState::Finishing => Ok((StepState::Complete, "patch strategy finished".to_string())),
            other => Err(format!("patch executor received unexpected step state {other:?}")),
        }
    }
}

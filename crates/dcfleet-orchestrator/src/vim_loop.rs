//! The VIM strategy sub-loop shared by the patch, upgrade, and kubernetes
//! (and firmware/kube-rootca) executors: create; poll until
//! ready-to-apply/build-failed; apply; poll until applied/failed; delete;
//! advance. One [`StepExecutor::advance`] call does at most one of these,
//! so the sub-loop spans several worker wakeups.

use dcfleet_domain::{StepState, SubcloudId};
use dcfleet_driver::{VimClient, VimStrategyPhase};

use crate::executor::StepAdvance;

/// The pair of step states a particular strategy kind uses for the
/// "creating" and "applying" halves of the sub-loop (they differ per kind
/// since `StepState` is a flat, kind-spanning namespace).
pub struct VimStepNames {
    pub creating: StepState,
    pub applying: StepState,
}

/// Drives one tick of the VIM sub-loop. `strategy_name` is the VIM
/// strategy's logical name (stable per strategy kind); `current` must be
/// one of `names.creating` or `names.applying`.
///
/// `create_strategy` is treated as idempotent: calling it again while a
/// strategy is already building/ready just returns its current status,
/// which lets this function stay stateless between calls rather than
/// smuggling a "have we issued create yet" flag through `StrategyStep`.
pub async fn step_vim_strategy(
    vim: &dyn VimClient,
    subcloud_id: SubcloudId,
    strategy_name: &str,
    extra_args: &serde_json::Value,
    current: StepState,
    names: &VimStepNames,
    next_after_applied: StepState,
) -> Result<StepAdvance, String> {
    if current == names.creating {
        let status = vim
            .create_strategy(subcloud_id, strategy_name, extra_args)
            .await
            .map_err(|e| e.to_string())?;
        return match status.phase {
            VimStrategyPhase::Building => Ok((names.creating, "vim strategy building".to_string())),
            VimStrategyPhase::Ready => {
                vim.apply_strategy(subcloud_id, strategy_name)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok((names.applying, "vim strategy applying".to_string()))
            }
            VimStrategyPhase::Failed | VimStrategyPhase::Aborted => Err(status.details),
            VimStrategyPhase::Applying | VimStrategyPhase::Applied => {
                Err(format!("unexpected vim phase {:?} while creating", status.phase))
            }
        };
    }

    if current == names.applying {
        let status = vim
            .get_strategy_status(subcloud_id, strategy_name)
            .await
            .map_err(|e| e.to_string())?;
        return match status.phase {
            VimStrategyPhase::Applying => Ok((names.applying, "vim strategy applying".to_string())),
            VimStrategyPhase::Applied => {
                vim.delete_strategy(subcloud_id, strategy_name)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok((next_after_applied, "vim strategy applied".to_string()))
            }
            VimStrategyPhase::Failed | VimStrategyPhase::Aborted => Err(status.details),
            VimStrategyPhase::Building | VimStrategyPhase::Ready => {
                Err(format!("unexpected vim phase {:?} while applying", status.phase))
            }
        };
    }

    Err(format!("vim sub-loop invoked with unexpected step state {current:?}"))
}

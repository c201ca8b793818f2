//! Kubernetes strategy pre-check: decides whether a subcloud needs a kube
//! upgrade at all before committing to the VIM strategy sub-loop. Grounded
//! in `dcmanager/tests/unit/orchestrator/states/kube/test_pre_check.py`'s
//! three branches.

use dcfleet_driver::{KubeUpgradeRecord, KubeVersion, KubeVersionState};

use crate::version::at_least;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreCheckOutcome {
    /// Target version is not yet reached; proceed to the VIM strategy.
    Proceed { target_version: String },
    /// Subcloud is already at or past the target; nothing to do.
    Skip,
}

/// `extra_target` is the explicit `to-version` from the strategy's
/// `extra_args`, if the operator supplied one.
pub fn kube_pre_check(
    existing_upgrade: Option<&KubeUpgradeRecord>,
    extra_target: Option<&str>,
    controller_versions: &[KubeVersion],
    subcloud_versions: &[KubeVersion],
) -> Result<PreCheckOutcome, String> {
    let target = resolve_target(extra_target, controller_versions)?;

    match existing_upgrade {
        // An upgrade is already recorded on the subcloud: compare the
        // (possibly re-derived) target against what that record is already
        // heading towards.
        Some(upgrade) => {
            if at_least(&target, &upgrade.to_version) {
                Ok(PreCheckOutcome::Proceed { target_version: target })
            } else {
                Ok(PreCheckOutcome::Skip)
            }
        }
        // No upgrade in progress: only proceed if the subcloud actually has
        // an available kube-version reaching the target.
        None => {
            let reaches_target = subcloud_versions
                .iter()
                .any(|v| v.state == KubeVersionState::Available && at_least(&v.version, &target));
            if reaches_target {
                Ok(PreCheckOutcome::Proceed { target_version: target })
            } else {
                Ok(PreCheckOutcome::Skip)
            }
        }
    }
}

fn resolve_target(extra_target: Option<&str>, controller_versions: &[KubeVersion]) -> Result<String, String> {
    if let Some(t) = extra_target {
        return Ok(t.to_string());
    }
    controller_versions
        .iter()
        .find(|v| v.target && v.state == KubeVersionState::Active)
        .map(|v| v.version.clone())
        .ok_or_else(|| "system controller has no active kube version".to_string())
}

pub mod engine;
pub mod error;
pub mod executor;
pub mod kube;
pub mod patch;
pub mod precheck;
pub mod upgrade;
pub mod version;
pub mod vim_loop;
pub mod vim_only;

pub use engine::Orchestrator;
pub use error::OrchestratorError;
pub use executor::{StepAdvance, StepExecutor};
pub use kube::KubeStepExecutor;
pub use patch::PatchStepExecutor;
pub use upgrade::UpgradeStepExecutor;
pub use vim_only::VimOnlyStepExecutor;

#[cfg(test)]
mod tests;

pub mod driver;
pub mod error;
pub mod local;

pub use driver::{
    Alarm, AuthToken, FmClient, IdentityClient, KubeUpgradeRecord, KubeVersion, KubeVersionState,
    PatchRecord, PatchingClient, SysinvClient, SystemInfo, VimClient, VimStrategyPhase,
    VimStrategyStatus, DEFAULT_CALL_DEADLINE_SECS,
};
pub use error::DriverError;
pub use local::LocalCapabilityDriver;

//! Re-exported from `dcfleet-domain`: the audit engine's kubernetes endpoint
//! audit needs the same major.minor comparison as the kube-upgrade precheck.
pub use dcfleet_domain::version::at_least;

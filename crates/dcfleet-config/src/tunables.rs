use std::env;

use crate::error::ConfigError;

/// Ambient tunables for the control-plane core. This is not a configuration
/// *loader* for strategy/subcloud CRUD bodies (that surface is out of
/// scope) — it's the handful of named constants the orchestrator, audit,
/// and sync engines read on every tick, with an env-var overlay for
/// deployment-time adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Seconds between subcloud audit passes.
    pub audit_interval_secs: u64,
    /// Consecutive audit failures before a subcloud is marked offline.
    pub max_audit_fail_count: u32,
    /// Max attempts per orch request before it is marked failed.
    pub max_retry: u32,
    /// Minimum interval between repeat writes of an unchanged endpoint status.
    pub endpoint_status_debounce_secs: i64,
    /// Seconds between strategy orchestrator loop ticks.
    pub orch_loop_tick_secs: u64,
    /// Upper bound accepted for `max_parallel_subclouds` on a strategy or group.
    pub max_parallel_subclouds_ceiling: u8,
    /// Capacity of the per-kind step worker pool.
    pub step_worker_pool_size: usize,
    /// Lower bound (seconds) of the randomized token-stale window.
    pub stale_token_duration_min: u64,
    /// Upper bound (seconds, exclusive) of the randomized token-stale window.
    pub stale_token_duration_max: u64,
    /// Step size (seconds) for the randomized token-stale window.
    pub stale_token_duration_step: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            audit_interval_secs: 60,
            max_audit_fail_count: 2,
            max_retry: 3,
            endpoint_status_debounce_secs: 3600,
            orch_loop_tick_secs: 10,
            max_parallel_subclouds_ceiling: 100,
            step_worker_pool_size: 25,
            stale_token_duration_min: 300,
            stale_token_duration_max: 480,
            stale_token_duration_step: 20,
        }
    }
}

impl Config {
    /// Overlays values from the process environment, leaving unset fields
    /// at their current value. Recognized variables:
    /// `DCFLEET_AUDIT_INTERVAL_SECS`, `DCFLEET_MAX_AUDIT_FAIL_COUNT`,
    /// `DCFLEET_MAX_RETRY`, `DCFLEET_ENDPOINT_STATUS_DEBOUNCE_SECS`,
    /// `DCFLEET_ORCH_LOOP_TICK_SECS`, `DCFLEET_MAX_PARALLEL_SUBCLOUDS_CEILING`,
    /// `DCFLEET_STEP_WORKER_POOL_SIZE`.
    pub fn overlay_from_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = parse_env("DCFLEET_AUDIT_INTERVAL_SECS")? {
            self.audit_interval_secs = v;
        }
        if let Some(v) = parse_env("DCFLEET_MAX_AUDIT_FAIL_COUNT")? {
            self.max_audit_fail_count = v;
        }
        if let Some(v) = parse_env("DCFLEET_MAX_RETRY")? {
            self.max_retry = v;
        }
        if let Some(v) = parse_env("DCFLEET_ENDPOINT_STATUS_DEBOUNCE_SECS")? {
            self.endpoint_status_debounce_secs = v;
        }
        if let Some(v) = parse_env("DCFLEET_ORCH_LOOP_TICK_SECS")? {
            self.orch_loop_tick_secs = v;
        }
        if let Some(v) = parse_env("DCFLEET_MAX_PARALLEL_SUBCLOUDS_CEILING")? {
            self.max_parallel_subclouds_ceiling = v;
        }
        if let Some(v) = parse_env("DCFLEET_STEP_WORKER_POOL_SIZE")? {
            self.step_worker_pool_size = v;
        }
        Ok(())
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|source| ConfigError::EnvParse {
                name: name.to_string(),
                value,
                source,
            }),
        Err(_) => Ok(None),
    }
}

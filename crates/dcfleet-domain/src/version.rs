//! Major.minor version comparison, ignoring micro — shared by the
//! orchestrator's kube-upgrade precheck and the audit engine's kubernetes
//! endpoint audit, grounded in `test_pre_check.py`'s version fixtures, which
//! only ever differ on the first two components.

/// Parses a leading `v`/`V` and the first two dot-separated numeric
/// components; anything after the second component (including a missing
/// one, treated as 0) is ignored.
fn major_minor(version: &str) -> (u32, u32) {
    let trimmed = version.trim_start_matches(['v', 'V']);
    let mut parts = trimmed.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}

/// True if `a`'s major.minor is greater than or equal to `b`'s.
pub fn at_least(a: &str, b: &str) -> bool {
    major_minor(a) >= major_minor(b)
}

//! Timeout validation for browser operations

use std::time::Duration;

/// Maximum timeout for browser navigation operations (5 minutes)
/// Covers slow-loading sites, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Validate a navigation timeout (navigate, open tab)
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(_)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
pub fn validate_navigation_timeout(ms: u64) -> anyhow::Result<Duration> {
    if ms == 0 {
        anyhow::bail!("navigation_timeout_ms must be greater than zero");
    }

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        anyhow::bail!(
            "navigation_timeout_ms cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        );
    }

    Ok(Duration::from_millis(ms))
}

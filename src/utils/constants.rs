//! Shared configuration constants for the research pipeline
//!
//! Default values used across modules to avoid magic numbers.

/// Chrome user agent string for stealth mode
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Initial interval when polling the page for readiness
pub const READY_POLL_START_MS: u64 = 100;

/// Cap on the readiness polling interval
pub const READY_POLL_MAX_MS: u64 = 1000;

//! Page readiness polling
//!
//! Replaces a fixed sleep after navigation with an explicit condition: the page is
//! considered settled once `document.readyState` reports `complete`.

use std::time::{Duration, Instant};

use chromiumoxide::Page;
use tracing::trace;

use super::constants::{READY_POLL_MAX_MS, READY_POLL_START_MS};
use crate::browser::{BrowserError, BrowserResult};

/// Wait until `document.readyState == "complete"` using exponential backoff polling
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry, capped at 1 second
/// - Total duration limited by `timeout`
///
/// Evaluation errors while the document is being swapped are treated as "not ready yet".
pub async fn wait_for_ready(page: &Page, timeout: Duration) -> BrowserResult<()> {
    let start = Instant::now();
    let mut poll_interval = Duration::from_millis(READY_POLL_START_MS);
    let max_interval = Duration::from_millis(READY_POLL_MAX_MS);

    loop {
        if let Ok(result) = page.evaluate("document.readyState").await {
            match result.into_value::<serde_json::Value>() {
                Ok(serde_json::Value::String(state)) if state == "complete" => return Ok(()),
                Ok(state) => trace!("readyState is {}", state),
                Err(e) => trace!("readyState not readable yet: {}", e),
            }
        }

        if start.elapsed() >= timeout {
            return Err(BrowserError::Timeout(format!(
                "page not ready after {}ms",
                timeout.as_millis()
            )));
        }

        tokio::time::sleep(poll_interval).await;
        poll_interval = (poll_interval * 2).min(max_interval);
    }
}

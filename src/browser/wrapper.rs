//! Browser process lifecycle
//!
//! Owns the chromiumoxide `Browser`, its CDP event handler task and the temp profile.

use anyhow::Result;
use chromiumoxide::browser::Browser;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::BrowserConfig;

/// Wrapper for Browser and its event handler task
///
/// Handler MUST be aborted to prevent it running indefinitely after the
/// browser is closed; `Drop` takes care of that. The Chrome process itself is only
/// closed by `shutdown()`.
pub struct BrowserWrapper {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
}

impl BrowserWrapper {
    pub(crate) fn new(browser: Browser, handler: JoinHandle<()>, user_data_dir: PathBuf) -> Self {
        Self {
            browser,
            handler,
            user_data_dir: Some(user_data_dir),
        }
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Close Chrome, wait for the process to exit, then remove the profile directory
    ///
    /// Safe to call more than once. Errors are logged, never returned: shutdown runs on
    /// failure paths where there is nothing left to propagate to.
    pub async fn shutdown(&mut self) {
        info!("Shutting down browser");

        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }

        // Chrome holds file handles on the profile until the process is gone
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to wait for browser exit: {}", e);
        }

        self.cleanup_temp_dir();
    }

    /// Remove the profile directory (blocking)
    ///
    /// Must run after `browser.wait()` so Chrome has released the files.
    fn cleanup_temp_dir(&mut self) {
        if let Some(path) = self.user_data_dir.take() {
            info!("Cleaning up temp directory: {}", path.display());
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!(
                    "Failed to clean up temp directory {}: {}. Manual cleanup may be required.",
                    path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for BrowserWrapper {
    fn drop(&mut self) {
        self.handler.abort();

        if let Some(path) = &self.user_data_dir {
            warn!(
                "BrowserWrapper dropped without shutdown(). Temp directory will be orphaned: {}",
                path.display()
            );
        }
    }
}

/// Launch a browser with a per-process profile directory
pub async fn launch_browser(config: &BrowserConfig) -> Result<BrowserWrapper> {
    info!("Launching research browser instance");

    let user_data_dir =
        std::env::temp_dir().join(format!("kodegen_research_{}", std::process::id()));

    let (browser, handler) =
        crate::browser_setup::launch_browser(config, Some(user_data_dir.clone())).await?;

    Ok(BrowserWrapper::new(browser, handler, user_data_dir))
}

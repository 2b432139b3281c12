//! Browser instance manager
//!
//! One manager owns at most one Chrome process. It is constructed explicitly and
//! handed to whoever drives a run; there is no process-wide instance.
//!
//! # Async Lock Requirements
//!
//! Uses `tokio::sync::Mutex`: the guard is held across browser `.await` points
//! during health checks and shutdown.

use anyhow::Result;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{ChromiumSession, SharedBrowser, shared};

/// Lazily launched, health-checked browser with scoped acquisition
///
/// - First `get_or_launch()`: launches Chrome (~2-3s)
/// - Later calls: health check via `Browser.getVersion`, relaunch if the process died
/// - `with_session()`: launch, run, always shut down
pub struct BrowserManager {
    config: BrowserConfig,
    session: Mutex<Option<SharedBrowser<ChromiumSession>>>,
}

impl BrowserManager {
    /// Create a manager; no browser is launched until first use
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Get or launch the browser session, replacing it if it has crashed
    pub async fn get_or_launch(&self) -> Result<SharedBrowser<ChromiumSession>> {
        let mut guard = self.session.lock().await;

        if let Some(existing) = guard.as_ref() {
            let mut session = existing.lock().await;
            if session.is_healthy().await {
                debug!("Browser health check passed, reusing existing browser");
                drop(session);
                return Ok(existing.clone());
            }

            warn!("Browser health check failed. Triggering recovery...");
            session.shutdown().await;
            drop(session);
            *guard = None;
        }

        info!("Launching browser (first time or after recovery)");
        let session = shared(ChromiumSession::launch(&self.config).await?);
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Run `f` with the browser and shut the browser down afterwards
    ///
    /// Shutdown happens whatever `f` returns, so a failed run never leaves Chrome
    /// running. Launch errors are returned without calling `f`.
    pub async fn with_session<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(SharedBrowser<ChromiumSession>) -> Fut,
        Fut: Future<Output = T>,
    {
        let session = self.get_or_launch().await?;
        let output = f(session).await;
        self.shutdown().await?;
        Ok(output)
    }

    /// Shut the browser down if running; subsequent calls are no-ops
    pub async fn shutdown(&self) -> Result<()> {
        let taken = self.session.lock().await.take();
        if let Some(session) = taken {
            session.lock().await.shutdown().await;
        }
        Ok(())
    }

    pub async fn is_browser_running(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            warn!("BrowserManager dropped without shutdown(); Chrome is killed but the profile directory is left behind");
        }
    }
}

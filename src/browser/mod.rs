//! Browser automation surface used by the evidence collector
//!
//! `BrowserSession` is the seam: the collector only sees tabs, selectors and text.
//! `ChromiumSession` drives a real Chrome through chromiumoxide.

mod chromium;
mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use chromium::ChromiumSession;
pub use wrapper::{BrowserWrapper, launch_browser};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Snapshot of a matched element, taken at query time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Resolved `href` of the element, if it has one
    pub href: Option<String>,
}

impl ElementHandle {
    pub fn link(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
        }
    }
}

/// A single reusable automation handle with an ordered set of tabs
///
/// Tab indices are positions in open order; index 0 is the tab the session started with.
/// Opening a tab does not move focus, mirroring WebDriver's `window.open`.
#[async_trait]
pub trait BrowserSession: Send + 'static {
    /// Load `url` in the active tab
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Elements matching `selector` in the active tab, in document order
    async fn find_elements(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>>;

    /// Open `url` in a new tab appended after the existing ones
    async fn open_in_new_tab(&mut self, url: &str) -> BrowserResult<()>;

    async fn switch_to_tab(&mut self, index: usize) -> BrowserResult<()>;

    /// Close the active tab; focus moves to the preceding tab
    async fn close_current_tab(&mut self) -> BrowserResult<()>;

    /// Visible text of the first element matching `selector` in the active tab
    async fn visible_text(&mut self, selector: &str) -> BrowserResult<String>;

    /// Wait until the active tab reports it has finished loading
    async fn wait_until_ready(&mut self, timeout: Duration) -> BrowserResult<()>;

    fn active_tab(&self) -> usize;

    fn tab_count(&self) -> usize;
}

/// Browser shared between collection calls; the mutex serializes tab access
pub type SharedBrowser<B> = Arc<Mutex<B>>;

pub fn shared<B: BrowserSession>(session: B) -> SharedBrowser<B> {
    Arc::new(Mutex::new(session))
}

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Element query failed for '{selector}': {reason}")]
    ElementQuery { selector: String, reason: String },

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),

    #[error("Tab index {index} out of range ({count} open)")]
    TabIndex { index: usize, count: usize },

    #[error("No active tab")]
    NoActiveTab,

    #[error("IO error: {0}")]
    IoError(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

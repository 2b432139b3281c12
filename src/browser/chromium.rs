//! `BrowserSession` over a real Chrome instance

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::wrapper::{BrowserWrapper, launch_browser};
use super::{BrowserError, BrowserResult, BrowserSession, ElementHandle};
use crate::BrowserConfig;

/// Tab-tracking session over one Chrome process
///
/// Tabs are chromiumoxide `Page`s kept in open order. Index 0 is the blank page created
/// at launch and is the tab searches run in.
pub struct ChromiumSession {
    wrapper: Option<BrowserWrapper>,
    tabs: Vec<Page>,
    active: usize,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    /// Launch Chrome and open the initial tab
    pub async fn launch(config: &BrowserConfig) -> anyhow::Result<Self> {
        let navigation_timeout = config.navigation_timeout()?;
        let mut wrapper = launch_browser(config).await?;

        let first = match wrapper.browser().new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                wrapper.shutdown().await;
                return Err(anyhow::anyhow!("Failed to create initial page: {}", e));
            }
        };

        info!("Browser session ready");
        Ok(Self {
            wrapper: Some(wrapper),
            tabs: vec![first],
            active: 0,
            navigation_timeout,
        })
    }

    /// Cheap liveness probe via the CDP `Browser.getVersion` command
    pub async fn is_healthy(&self) -> bool {
        match self.browser() {
            Ok(browser) => browser.version().await.is_ok(),
            Err(_) => false,
        }
    }

    /// Close every tab and the browser process; idempotent
    pub async fn shutdown(&mut self) {
        self.tabs.clear();
        self.active = 0;
        if let Some(mut wrapper) = self.wrapper.take() {
            wrapper.shutdown().await;
        }
    }

    fn browser(&self) -> BrowserResult<&Browser> {
        self.wrapper
            .as_ref()
            .map(BrowserWrapper::browser)
            .ok_or_else(|| BrowserError::LaunchFailed("browser has been shut down".into()))
    }

    fn current_page(&self) -> BrowserResult<&Page> {
        self.tabs.get(self.active).ok_or(BrowserError::NoActiveTab)
    }

    async fn element_text(element: &Element) -> BrowserResult<String> {
        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::TextExtraction(e.to_string()))?
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return Ok(text);
        }

        // Script-rendered pages can report empty innerText; convert the markup instead
        let html = element
            .outer_html()
            .await
            .map_err(|e| BrowserError::TextExtraction(e.to_string()))?
            .unwrap_or_default();
        Ok(html2md::parse_html(&html))
    }

    async fn element_href(element: &Element) -> Option<String> {
        // The property is resolved against the base URL; the attribute may be relative
        if let Ok(Some(serde_json::Value::String(href))) = element.property("href").await {
            return Some(href);
        }
        element.attribute("href").await.ok().flatten()
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        let page = self.current_page()?;
        debug!("Navigating tab {} to {}", self.active, url);

        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "navigation to {} after {}ms",
                    url,
                    self.navigation_timeout.as_millis()
                ))
            })?
            .map_err(|e| BrowserError::NavigationFailed(format!("{}: {}", url, e)))?;

        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        let page = self.current_page()?;
        let elements =
            page.find_elements(selector)
                .await
                .map_err(|e| BrowserError::ElementQuery {
                    selector: selector.to_string(),
                    reason: e.to_string(),
                })?;

        let mut handles = Vec::with_capacity(elements.len());
        for element in &elements {
            handles.push(ElementHandle {
                href: Self::element_href(element).await,
            });
        }
        Ok(handles)
    }

    async fn open_in_new_tab(&mut self, url: &str) -> BrowserResult<()> {
        let browser = self.browser()?;
        let page = tokio::time::timeout(self.navigation_timeout, browser.new_page(url))
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "opening {} after {}ms",
                    url,
                    self.navigation_timeout.as_millis()
                ))
            })?
            .map_err(|e| BrowserError::PageCreationFailed(format!("{}: {}", url, e)))?;

        self.tabs.push(page);
        debug!("Opened tab {} for {}", self.tabs.len() - 1, url);
        Ok(())
    }

    async fn switch_to_tab(&mut self, index: usize) -> BrowserResult<()> {
        let page = self.tabs.get(index).ok_or(BrowserError::TabIndex {
            index,
            count: self.tabs.len(),
        })?;

        if let Err(e) = page.bring_to_front().await {
            // Focus is logical for CDP; a failed activation does not block page access
            warn!("Failed to bring tab {} to front: {}", index, e);
        }
        self.active = index;
        Ok(())
    }

    async fn close_current_tab(&mut self) -> BrowserResult<()> {
        if self.active >= self.tabs.len() {
            return Err(BrowserError::NoActiveTab);
        }

        let page = self.tabs.remove(self.active);
        let closed = self.active;
        self.active = self.active.saturating_sub(1);

        page.close()
            .await
            .map_err(|e| BrowserError::PageCreationFailed(format!("closing tab {}: {}", closed, e)))
    }

    async fn visible_text(&mut self, selector: &str) -> BrowserResult<String> {
        let page = self.current_page()?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementQuery {
                selector: selector.to_string(),
                reason: e.to_string(),
            })?;

        Self::element_text(&element).await
    }

    async fn wait_until_ready(&mut self, timeout: Duration) -> BrowserResult<()> {
        let page = self.current_page()?;
        crate::utils::wait_for_ready(page, timeout).await
    }

    fn active_tab(&self) -> usize {
        self.active
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }
}

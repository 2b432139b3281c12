//! Evidence collection: one question in, one evidence string out
//!
//! Searches, opens the top results as ephemeral tabs, extracts bounded text from each
//! and joins the extracts. Failures never escape `collect`: a broken page is skipped,
//! a broken search becomes a failure-marker string.

mod extract;

pub use extract::{
    EXTRACT_SEPARATOR, Evidence, FAILURE_MARKER_PREFIX, PageExtract, failure_marker,
    is_failure_marker, join_extracts, truncate_chars,
};

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserResult, BrowserSession, ElementHandle, SharedBrowser};

/// How to wait for a page to render after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleMode {
    /// Sleep for a fixed interval
    Fixed(Duration),
    /// Poll the page until it reports ready, giving up after `timeout`
    UntilReady { timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Search URL; `{query}` is replaced with the URL-encoded question
    pub search_url: String,
    pub result_selector: String,
    /// Element whose visible text is extracted from each result page
    pub text_selector: String,
    pub max_results: usize,
    pub max_chars: usize,
    pub settle: SettleMode,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        crate::CollectorConfig::default().to_options()
    }
}

impl CollectorOptions {
    pub fn search_url(&self, question: &str) -> String {
        self.search_url
            .replace("{query}", &urlencoding::encode(question))
    }
}

/// Scrapes search results for a question through a shared browser
///
/// Each collection runs as its own task holding the browser lock until the tab set is
/// restored, so concurrent callers are serialized and a caller that stops waiting
/// never leaves result tabs behind.
pub struct EvidenceCollector<B> {
    browser: SharedBrowser<B>,
    options: CollectorOptions,
    cancel: Option<CancellationToken>,
}

impl<B: BrowserSession> EvidenceCollector<B> {
    pub fn new(browser: SharedBrowser<B>, options: CollectorOptions) -> Self {
        Self {
            browser,
            options,
            cancel: None,
        }
    }

    /// Stop opening further result pages once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &CollectorOptions {
        &self.options
    }

    pub fn browser(&self) -> &SharedBrowser<B> {
        &self.browser
    }

    pub fn search_url(&self, question: &str) -> String {
        self.options.search_url(question)
    }

    /// Collect evidence using the configured result limit
    pub async fn collect(&self, question: &str) -> String {
        self.collect_with_limit(question, self.options.max_results)
            .await
    }

    /// Collect evidence from at most `max_results` result links
    ///
    /// Returns the joined extracts (possibly empty), or a failure marker when the search
    /// itself failed. The browser's tab set and active tab are the same on return as on
    /// entry.
    pub async fn collect_with_limit(&self, question: &str, max_results: usize) -> String {
        self.run(question, max_results, self.cancel.clone())
            .await
            .into_string()
    }

    /// Collect evidence, stopping before the next result page once `cancel` fires
    ///
    /// Pages extracted before cancellation are still returned.
    pub async fn collect_cancellable(&self, question: &str, cancel: &CancellationToken) -> String {
        self.gather(question, cancel).await.into_string()
    }

    /// Like `collect_cancellable`, but keeps a failed search distinguishable from page text
    pub async fn gather(&self, question: &str, cancel: &CancellationToken) -> Evidence {
        self.run(question, self.options.max_results, Some(cancel.clone()))
            .await
    }

    async fn run(
        &self,
        question: &str,
        max_results: usize,
        cancel: Option<CancellationToken>,
    ) -> Evidence {
        let browser = self.browser.clone();
        let options = self.options.clone();
        let query = question.to_string();

        // Detached: dropping this future must not skip tab restoration
        let task = tokio::spawn(async move {
            collect_in_browser(browser, options, query, max_results, cancel).await
        });

        match task.await {
            Ok(evidence) => evidence,
            Err(e) => {
                error!("Evidence collection task for '{}' failed: {}", question, e);
                Evidence::SearchFailed(failure_marker(&e))
            }
        }
    }
}

async fn collect_in_browser<B: BrowserSession>(
    browser: SharedBrowser<B>,
    options: CollectorOptions,
    question: String,
    max_results: usize,
    cancel: Option<CancellationToken>,
) -> Evidence {
    let mut guard = browser.lock().await;
    let session: &mut B = &mut guard;

    let origin = session.active_tab();
    let baseline = session.tab_count();

    let links = match search(session, &options, &question, max_results).await {
        Ok(links) => links,
        Err(e) => {
            warn!("Research error for '{}': {}", question, e);
            restore_tabs(session, origin, baseline).await;
            return Evidence::SearchFailed(failure_marker(&e));
        }
    };

    info!("Found {} result links for '{}'", links.len(), question);

    let mut extracts = Vec::with_capacity(links.len());
    for url in &links {
        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            info!("Collection cancelled after {} pages", extracts.len());
            break;
        }

        match extract_page(session, &options, url).await {
            Ok(extract) => {
                debug!(
                    "Extracted {} chars from {}{}",
                    extract.text.chars().count(),
                    url,
                    if extract.truncated { " (truncated)" } else { "" }
                );
                extracts.push(extract);
            }
            Err(e) => warn!("Error extracting text from {}: {}", url, e),
        }

        restore_tabs(session, origin, baseline).await;
    }

    Evidence::Collected(join_extracts(&extracts))
}

async fn search<B: BrowserSession>(
    session: &mut B,
    options: &CollectorOptions,
    question: &str,
    max_results: usize,
) -> BrowserResult<Vec<String>> {
    session.navigate(&options.search_url(question)).await?;
    settle(session, options.settle).await;

    let elements = session.find_elements(&options.result_selector).await?;
    Ok(select_links(elements, max_results))
}

async fn extract_page<B: BrowserSession>(
    session: &mut B,
    options: &CollectorOptions,
    url: &str,
) -> BrowserResult<PageExtract> {
    session.open_in_new_tab(url).await?;
    let opened = session.tab_count().saturating_sub(1);
    session.switch_to_tab(opened).await?;
    settle(session, options.settle).await;

    let text = session.visible_text(&options.text_selector).await?;
    Ok(PageExtract::new(url, &text, options.max_chars))
}

async fn settle<B: BrowserSession>(session: &mut B, mode: SettleMode) {
    match mode {
        SettleMode::Fixed(interval) => {
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
        SettleMode::UntilReady { timeout } => {
            // Extraction may still succeed on a page that never reports ready
            if let Err(e) = session.wait_until_ready(timeout).await {
                debug!("Page did not settle: {}", e);
            }
        }
    }
}

/// First `max_results` matched elements, keeping only those with an http(s) target
///
/// Document order is preserved; elements without a usable link are dropped after the
/// cut, so fewer than `max_results` links may come back.
pub fn select_links(elements: Vec<ElementHandle>, max_results: usize) -> Vec<String> {
    elements
        .into_iter()
        .take(max_results)
        .filter_map(|element| element.href)
        .filter(|href| is_http_url(href))
        .collect()
}

fn is_http_url(href: &str) -> bool {
    url::Url::parse(href)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Close every tab opened past `baseline` and refocus `origin`
async fn restore_tabs<B: BrowserSession>(session: &mut B, origin: usize, baseline: usize) {
    while session.tab_count() > baseline {
        let last = session.tab_count() - 1;
        if let Err(e) = session.switch_to_tab(last).await {
            warn!("Failed to focus tab {} for closing: {}", last, e);
            break;
        }
        if let Err(e) = session.close_current_tab().await {
            warn!("Failed to close tab {}: {}", last, e);
            break;
        }
    }

    if session.active_tab() != origin
        && let Err(e) = session.switch_to_tab(origin).await
    {
        warn!("Failed to return to tab {}: {}", origin, e);
    }
}

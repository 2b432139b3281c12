#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use kodegen_tools_research::browser::{BrowserError, BrowserResult, BrowserSession, ElementHandle};
use kodegen_tools_research::completion::{
    CompletionError, CompletionResult, GenerationOptions, TextCompletionClient,
};
use kodegen_tools_research::evidence::{CollectorOptions, SettleMode};

/// Collector options with no settle delay
pub fn fast_options() -> CollectorOptions {
    CollectorOptions {
        settle: SettleMode::Fixed(Duration::ZERO),
        ..CollectorOptions::default()
    }
}

/// In-memory browser with WebDriver-like tab semantics
///
/// Search results are keyed by a substring of the search URL; page text is keyed by URL.
#[derive(Default)]
pub struct FakeBrowser {
    pub tabs: Vec<String>,
    pub active: usize,
    pub results: Vec<(String, Vec<ElementHandle>)>,
    pub pages: HashMap<String, Result<String, String>>,
    pub failing_searches: Vec<String>,
    pub failing_opens: HashSet<String>,
    pub navigations: Vec<String>,
    pub opened: Vec<String>,
    pub ready_waits: usize,
    pub max_tabs_seen: usize,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            tabs: vec!["about:blank".to_string()],
            max_tabs_seen: 1,
            ..Self::default()
        }
    }

    /// Links returned for any search URL containing `needle`
    pub fn with_results(mut self, needle: &str, links: &[&str]) -> Self {
        let handles = links.iter().map(|href| ElementHandle::link(*href)).collect();
        self.results.push((needle.to_string(), handles));
        self
    }

    pub fn with_elements(mut self, needle: &str, elements: Vec<ElementHandle>) -> Self {
        self.results.push((needle.to_string(), elements));
        self
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(text.to_string()));
        self
    }

    pub fn with_broken_page(mut self, url: &str, error: &str) -> Self {
        self.pages.insert(url.to_string(), Err(error.to_string()));
        self
    }

    pub fn with_failing_search(mut self, needle: &str) -> Self {
        self.failing_searches.push(needle.to_string());
        self
    }

    pub fn with_failing_open(mut self, url: &str) -> Self {
        self.failing_opens.insert(url.to_string());
        self
    }

    fn current_url(&self) -> BrowserResult<&str> {
        self.tabs
            .get(self.active)
            .map(String::as_str)
            .ok_or(BrowserError::NoActiveTab)
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        self.navigations.push(url.to_string());
        if self.failing_searches.iter().any(|needle| url.contains(needle.as_str())) {
            return Err(BrowserError::NavigationFailed(format!(
                "{url}: net::ERR_NAME_NOT_RESOLVED"
            )));
        }
        let active = self.active;
        let tab = self.tabs.get_mut(active).ok_or(BrowserError::NoActiveTab)?;
        *tab = url.to_string();
        Ok(())
    }

    async fn find_elements(&mut self, _selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        let url = self.current_url()?.to_string();
        Ok(self
            .results
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, elements)| elements.clone())
            .unwrap_or_default())
    }

    async fn open_in_new_tab(&mut self, url: &str) -> BrowserResult<()> {
        self.opened.push(url.to_string());
        if self.failing_opens.contains(url) {
            return Err(BrowserError::PageCreationFailed(format!("{url}: refused")));
        }
        self.tabs.push(url.to_string());
        self.max_tabs_seen = self.max_tabs_seen.max(self.tabs.len());
        Ok(())
    }

    async fn switch_to_tab(&mut self, index: usize) -> BrowserResult<()> {
        if index >= self.tabs.len() {
            return Err(BrowserError::TabIndex {
                index,
                count: self.tabs.len(),
            });
        }
        self.active = index;
        Ok(())
    }

    async fn close_current_tab(&mut self) -> BrowserResult<()> {
        if self.active >= self.tabs.len() {
            return Err(BrowserError::NoActiveTab);
        }
        self.tabs.remove(self.active);
        self.active = self.active.saturating_sub(1);
        Ok(())
    }

    async fn visible_text(&mut self, _selector: &str) -> BrowserResult<String> {
        let url = self.current_url()?.to_string();
        match self.pages.get(&url) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(error)) => Err(BrowserError::TextExtraction(error.clone())),
            None => Err(BrowserError::TextExtraction(format!("no page for {url}"))),
        }
    }

    async fn wait_until_ready(&mut self, _timeout: Duration) -> BrowserResult<()> {
        self.ready_waits += 1;
        Ok(())
    }

    fn active_tab(&self) -> usize {
        self.active
    }

    fn tab_count(&self) -> usize {
        self.tabs.len()
    }
}

/// Completion client that replays scripted responses in order
#[derive(Default)]
pub struct ScriptedCompletion {
    responses: parking_lot::Mutex<VecDeque<CompletionResult<String>>>,
    prompts: parking_lot::Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<CompletionResult<String>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
            prompts: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextCompletionClient for ScriptedCompletion {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> CompletionResult<String> {
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Transport("no scripted response".into())))
    }
}

/// Completion client whose first call blocks until released
pub struct GatedCompletion {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    inner: ScriptedCompletion,
    gated: parking_lot::Mutex<bool>,
}

impl GatedCompletion {
    pub fn new(responses: Vec<CompletionResult<String>>) -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            inner: ScriptedCompletion::new(responses),
            gated: parking_lot::Mutex::new(true),
        }
    }
}

#[async_trait]
impl TextCompletionClient for GatedCompletion {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> CompletionResult<String> {
        let gate = std::mem::replace(&mut *self.gated.lock(), false);
        if gate {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.generate(prompt, options).await
    }
}

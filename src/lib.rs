//! Research pipeline for AI agents
//!
//! Turns a free-text topic into a report: sub-questions from an LLM, web evidence per
//! question via chromiumoxide, and a synthesized report from the same LLM.

pub mod browser;
pub mod browser_setup;
pub mod completion;
pub mod evidence;
mod manager;
pub mod research;
mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::completion::GenerationOptions;
use crate::evidence::{CollectorOptions, SettleMode};

/// Environment variable pointing at an alternate config file
pub const CONFIG_ENV_VAR: &str = "RESEARCH_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Chat completions endpoint and sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,

    /// Upper bound on a single completion request
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

/// Search and scraping behaviour of the evidence collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Search URL; `{query}` is replaced with the URL-encoded question
    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_result_selector")]
    pub result_selector: String,

    #[serde(default = "default_text_selector")]
    pub text_selector: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-page character cap on extracted text
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Fixed settle interval after navigation
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Poll `document.readyState` instead of sleeping for `settle_ms`
    #[serde(default)]
    pub wait_until_ready: bool,

    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Upper bound on a single navigation or tab open
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_base_url() -> String {
    "https://api.together.xyz/v1".to_string()
}
fn default_api_key_env() -> String {
    "TOGETHER_API_KEY".to_string()
}
fn default_model() -> String {
    "meta-llama/Llama-3-8b-chat-hf".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u64 {
    2048
}
fn default_completion_timeout_secs() -> u64 {
    120
}

fn default_search_url() -> String {
    "https://www.google.com/search?q={query}".to_string()
}
fn default_result_selector() -> String {
    "div.g a".to_string()
}
fn default_text_selector() -> String {
    "body".to_string()
}
fn default_max_results() -> usize {
    3
}
fn default_max_chars() -> usize {
    5000
}
fn default_settle_ms() -> u64 {
    2000
}
fn default_ready_timeout_ms() -> u64 {
    10_000
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            result_selector: default_result_selector(),
            text_selector: default_text_selector(),
            max_results: default_max_results(),
            max_chars: default_max_chars(),
            settle_ms: default_settle_ms(),
            wait_until_ready: false,
            ready_timeout_ms: default_ready_timeout_ms(),
        }
    }
}

impl CollectorConfig {
    pub fn to_options(&self) -> CollectorOptions {
        let settle = if self.wait_until_ready {
            SettleMode::UntilReady {
                timeout: Duration::from_millis(self.ready_timeout_ms),
            }
        } else {
            SettleMode::Fixed(Duration::from_millis(self.settle_ms))
        };

        CollectorOptions {
            search_url: self.search_url.clone(),
            result_selector: self.result_selector.clone(),
            text_selector: self.text_selector.clone(),
            max_results: self.max_results,
            max_chars: self.max_chars,
            settle,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            window: WindowConfig::default(),
        }
    }
}

impl BrowserConfig {
    /// Validated navigation timeout
    pub fn navigation_timeout(&self) -> anyhow::Result<Duration> {
        utils::validate_navigation_timeout(self.navigation_timeout_ms)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

/// Load config from `$RESEARCH_CONFIG`, else `config.yaml` in the working directory
///
/// Falls back to defaults when neither file exists.
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));

    if config_path.exists() {
        load_yaml_config_from(&config_path)
    } else {
        Ok(Config::default())
    }
}

/// Load config from an explicit path
pub fn load_yaml_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    let config: Config = serde_yaml::from_str(&contents)?;
    // Surface a bad timeout at load time rather than mid-run
    config.browser.navigation_timeout()?;
    Ok(config)
}

pub use browser::{
    BrowserError, BrowserResult, BrowserSession, BrowserWrapper, ChromiumSession, ElementHandle,
    SharedBrowser, find_browser_executable, launch_browser, shared,
};
pub use completion::{ChatCompletionsClient, CompletionError, TextCompletionClient};
pub use evidence::{Evidence, EvidenceCollector, PageExtract, is_failure_marker};
pub use manager::BrowserManager;
pub use research::{
    ResearchError, ResearchOrchestrator, ResearchSession, ResearchStatus, ResearchStep,
    SessionHandle,
};

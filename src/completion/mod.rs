//! Text generation collaborator
//!
//! The orchestrator only depends on `TextCompletionClient`; `ChatCompletionsClient`
//! talks to any OpenAI-compatible chat completions endpoint.

mod chat;

pub use chat::ChatCompletionsClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "meta-llama/Llama-3-8b-chat-hf".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

/// Stateless request/response text generation
#[async_trait]
pub trait TextCompletionClient: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> CompletionResult<String>;
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Missing API key: set {0}")]
    MissingApiKey(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    Parse(String),

    #[error("Completion response contained no text")]
    EmptyResponse,
}

pub type CompletionResult<T> = Result<T, CompletionError>;

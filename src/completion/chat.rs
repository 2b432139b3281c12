//! OpenAI-compatible chat completions client (Together AI by default)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{CompletionError, CompletionResult, GenerationOptions, TextCompletionClient};
use crate::CompletionConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Single-turn chat completions over HTTP
///
/// Every prompt is sent as one `user` message; no conversation state is kept.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> CompletionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Build from config, reading the API key from `config.api_key_env`
    pub fn from_config(config: &CompletionConfig) -> CompletionResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CompletionError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(config.base_url.clone(), api_key, config.timeout())
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

fn build_request<'a>(prompt: &'a str, options: &'a GenerationOptions) -> ChatRequest<'a> {
    ChatRequest {
        model: &options.model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    }
}

fn extract_content(response: ChatResponse) -> CompletionResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(CompletionError::EmptyResponse)
}

#[async_trait]
impl TextCompletionClient for ChatCompletionsClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> CompletionResult<String> {
        debug!(
            "Requesting completion from {} (model {}, {} prompt chars)",
            self.base_url,
            options.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&build_request(prompt, options))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout.as_secs())
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Completion API error {}: {}", status.as_u16(), body);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        extract_content(parsed)
    }
}

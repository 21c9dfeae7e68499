//! LLM client abstraction and the Gemini implementation.
//!
//! - **[`DisabledClient`]**: always errors; used when `llm.provider = "disabled"`.
//! - **[`GeminiClient`]**: calls the Gemini `generateContent` endpoint with
//!   retry and exponential backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (overloaded / server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: `base_delay_ms × 2^n` before the n-th retry (n from 0)
//!
//! The client never reads the environment. The API key arrives through
//! [`GeminiSettings`], resolved by [`crate::config::load_config`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM provider is disabled; set llm.provider in the config")]
    Disabled,
    #[error("LLM API key not set (expected in env var {0})")]
    MissingApiKey(String),
    #[error("invalid LLM request: {0}")]
    Validation(String),
    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM request failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("LLM response contained no text")]
    EmptyResponse,
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

/// A text-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, for logs and stored metadata.
    fn model_name(&self) -> &str;

    /// Send `prompt` and return the model's text reply.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the client selected by `config.provider`.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.provider.as_str() {
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
            let settings = GeminiSettings {
                api_key,
                model: config.model.clone(),
                base_url: config.base_url.clone(),
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.base_delay_ms),
                timeout: Duration::from_secs(config.timeout_secs),
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            };
            Ok(Arc::new(GeminiClient::new(settings)?))
        }
        _ => Ok(Arc::new(DisabledClient)),
    }
}

// ============ Disabled Client ============

pub struct DisabledClient;

#[async_trait]
impl LlmClient for DisabledClient {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

// ============ Gemini Client ============

/// Explicit settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    /// e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

pub struct GeminiClient {
    settings: GeminiSettings,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self { settings, http })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn backoff(&self, retry: u32) -> Duration {
        self.settings.base_delay * 2u32.pow(retry.min(6))
    }
}

/// Pull `candidates[0].content.parts[0].text` out of a Gemini response.
fn response_text(json: &serde_json::Value) -> Option<&str> {
    json.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .filter(|t| !t.trim().is_empty())
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::Validation("prompt is empty".to_string()));
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.settings.temperature,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": self.settings.max_output_tokens,
            },
        });
        let url = self.endpoint();
        debug!(model = %self.settings.model, prompt_chars = prompt.len(), "calling LLM");

        let mut last_err = String::new();
        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = self.backoff(attempt - 1);
                warn!(
                    attempt,
                    max_retries = self.settings.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_err,
                    "retrying LLM request"
                );
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .query(&[("key", self.settings.api_key.as_str())])
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = match response.json().await {
                            Ok(json) => json,
                            Err(e) => {
                                last_err = format!("unreadable response body: {}", e);
                                continue;
                            }
                        };
                        return response_text(&json)
                            .map(str::to_string)
                            .ok_or(LlmError::EmptyResponse);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = format!("HTTP {}: {}", status.as_u16(), body_text);
                        continue;
                    }

                    // Client error (not 429): don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(LlmError::Api {
                        status: status.as_u16(),
                        body: body_text,
                    });
                }
                Err(e) => {
                    // Strip the URL: it carries the API key.
                    last_err = e.without_url().to_string();
                    continue;
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.settings.max_retries + 1,
            last: last_err,
        })
    }
}

//! Chat-completion provider used to phrase answers from retrieved context.
//!
//! Mirrors the embedding adapter: a small trait plus an OpenAI-compatible client issuing raw
//! HTTP requests, so tests can point it at a mock server.

use crate::config::OpenAiSettings;
use crate::error::ErrorKind;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    /// Provider could not be reached.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Completion provider returned {status}: {body}")]
    GenerationFailed {
        /// HTTP status code.
        status: StatusCode,
        /// Response body.
        body: String,
    },
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl CompletionClientError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

/// Interface implemented by text-generation providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a response for a fully assembled prompt.
    async fn complete(&self, prompt: &str) -> Result<String, CompletionClientError>;
}

/// OpenAI-compatible `/chat/completions` client pinned to temperature 0.
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    /// Build a client from provider settings.
    pub fn new(settings: &OpenAiSettings) -> Result<Self, CompletionClientError> {
        let http = Client::builder()
            .user_agent("pdfqa/completion")
            .build()
            .map_err(|error| CompletionClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.completion_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionClientError> {
        let payload = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(model = %self.model, %status, "Completion request failed");
            return Err(CompletionClientError::GenerationFailed { status, body });
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode completion response: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CompletionClientError::InvalidResponse("response had no content".into()))
    }
}

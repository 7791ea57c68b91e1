//! AI completion providers.
//!
//! Every provider exposes a single streaming completion call. The pipeline never
//! talks to a provider directly; it goes through [`CompletionStreamer`], which adds
//! retry on connect and cooperative cancellation.
//!
//! ## Providers
//!
//! - `claude` - Anthropic Messages API (server-sent events)
//! - `openai` - OpenAI chat completions or any compatible endpoint (server-sent events)
//! - `ollama` - local Ollama server (newline-delimited JSON)
//! - [`ScriptedProvider`] - replays fixed chunks, used by tests

#[cfg(feature = "ai")]
mod claude;
#[cfg(feature = "ai")]
mod ollama;
#[cfg(feature = "ai")]
mod openai;
mod scripted;
#[cfg(feature = "ai")]
mod sse;
mod streamer;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

#[cfg(feature = "ai")]
pub use claude::ClaudeProvider;
#[cfg(feature = "ai")]
pub use ollama::OllamaProvider;
#[cfg(feature = "ai")]
pub use openai::OpenAIProvider;
pub use scripted::ScriptedProvider;
pub use streamer::{ActiveStream, CancelHandle, CompletionStreamer, StreamError};

use crate::core::AiConfig;

/// Incremental text produced by a provider.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Per-request generation options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Model override; the provider default is used when unset
    pub model: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { max_tokens: 8192, temperature: 0.7, model: None }
    }
}

impl From<&AiConfig> for CompletionOptions {
    fn from(config: &AiConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            model: config.model.clone(),
        }
    }
}

/// Trait for streaming completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Start a completion and return its chunk stream.
    ///
    /// Errors returned here happen before any text was produced; errors yielded by
    /// the stream happen mid-response.
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// AI provider error types.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Malformed stream event: {0}")]
    Malformed(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotAvailable(_) | Self::Malformed(_) | Self::Stream(_) => false,
        }
    }
}

#[cfg(feature = "ai")]
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Turn a non-success HTTP response into a provider error.
#[cfg(feature = "ai")]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimited);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api { status: status.as_u16(), body })
}

/// Build the provider named in the configuration.
#[cfg(feature = "ai")]
pub fn provider_from_config(config: &AiConfig) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.provider.to_lowercase().as_str() {
        "claude" | "anthropic" => Arc::new(ClaudeProvider::new()?),
        "openai" => Arc::new(OpenAIProvider::new()?.with_base_url(&config.openai.base_url)),
        "ollama" => Arc::new(
            OllamaProvider::new()
                .with_base_url(&config.ollama.base_url)
                .with_model(&config.ollama.model),
        ),
        other => anyhow::bail!("Unknown AI provider '{}' (expected claude, openai, or ollama)", other),
    };
    tracing::debug!(provider = provider.name(), "Selected AI provider");
    Ok(provider)
}

/// Build the provider named in the configuration.
#[cfg(not(feature = "ai"))]
pub fn provider_from_config(config: &AiConfig) -> anyhow::Result<Arc<dyn CompletionProvider>> {
    anyhow::bail!("Provider '{}' requires the `ai` feature", config.provider)
}

//! OpenAI API integration.
//!
//! Streams chat completions from OpenAI or any compatible endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::sse::{sse_text_stream, SseEvent};
use super::{check_status, ChatMessage, ChunkStream, CompletionOptions, CompletionProvider, ProviderError};

/// OpenAI API provider.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    ///
    /// Reads API key from OPENAI_API_KEY environment variable.
    pub fn new() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a custom base URL (for compatible APIs).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// Extract text from one streamed event.
fn parse_event(event: &SseEvent) -> Result<Option<String>, ProviderError> {
    if event.data.trim() == "[DONE]" {
        return Ok(None);
    }

    let chunk: StreamChunk =
        serde_json::from_str(&event.data).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let request = OpenAIRequest {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            max_tokens: Some(options.max_tokens),
            temperature: Some(options.temperature),
            stream: true,
        };
        tracing::debug!(model = %request.model, base_url = %self.base_url, "OpenAI request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(sse_text_stream(response.bytes_stream(), parse_event))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// OpenAI API request structure.
#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// One streamed chunk.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

//! Ollama local LLM integration.
//!
//! Streams chat completions from a local Ollama server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::sse::line_text_stream;
use super::{check_status, ChatMessage, ChunkStream, CompletionOptions, CompletionProvider, ProviderError};

/// Ollama API provider for local LLM.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default settings.
    ///
    /// Uses localhost:11434 by default.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
        }
    }

    /// Create with a specific base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract text from one NDJSON line.
fn parse_line(line: &str) -> Result<Option<String>, ProviderError> {
    let chunk: ChatChunk =
        serde_json::from_str(line).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::Stream(error));
    }

    Ok(chunk.message.map(|m| m.content).filter(|text| !text.is_empty()))
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let request = OllamaChatRequest {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            stream: true,
            options: ModelOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };
        tracing::debug!(model = %request.model, base_url = %self.base_url, "Ollama request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::NotAvailable(format!("Ollama is not running at {}", self.base_url))
                } else {
                    e.into()
                }
            })?;
        let response = check_status(response).await?;

        Ok(line_text_stream(response.bytes_stream(), parse_line))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat request structure.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: String,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ModelOptions,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f32,
    num_predict: u32,
}

/// One streamed response line.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: Option<ChunkMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_ollama_with_custom_url() {
        let provider = OllamaProvider::new().with_base_url("http://custom:8080");
        assert_eq!(provider.base_url, "http://custom:8080");
    }

    #[test]
    fn test_ollama_with_custom_model() {
        let provider = OllamaProvider::new().with_model("mistral");
        assert_eq!(provider.model, "mistral");
    }

    #[test]
    fn test_parse_line() {
        let text =
            parse_line(r#"{"model":"m","message":{"role":"assistant","content":"Once"},"done":false}"#)
                .unwrap();
        assert_eq!(text.as_deref(), Some("Once"));

        let done = parse_line(r#"{"model":"m","message":{"role":"assistant","content":""},"done":true}"#)
            .unwrap();
        assert!(done.is_none());
    }

    #[test]
    fn test_parse_error_line() {
        let err = parse_line(r#"{"error":"model not found"}"#).unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }
}

//! Claude API integration.
//!
//! Streams completions from the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::sse::{sse_text_stream, SseEvent};
use super::{
    check_status, ChatMessage, ChunkStream, CompletionOptions, CompletionProvider, ProviderError,
    Role,
};

/// Claude API provider.
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClaudeProvider {
    /// Create a new Claude provider.
    ///
    /// Reads API key from ANTHROPIC_API_KEY environment variable.
    pub fn new() -> anyhow::Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY not set"))?;

        Ok(Self {
            client: Client::new(),
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com/v1".to_string(),
        })
    }

    /// Create with a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Create with a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build the request body. System messages move to the top-level `system` field.
    fn build_request(&self, messages: &[ChatMessage], options: &CompletionOptions) -> ClaudeRequest {
        let system = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        ClaudeRequest {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system: (!system.is_empty()).then_some(system),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| Message { role: m.role, content: m.content.clone() })
                .collect(),
            stream: true,
        }
    }
}

/// Extract text from one streamed event.
fn parse_event(event: &SseEvent) -> Result<Option<String>, ProviderError> {
    let payload: StreamEvent =
        serde_json::from_str(&event.data).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    match payload.kind.as_str() {
        "content_block_delta" => {
            Ok(payload.delta.and_then(|d| d.text).filter(|text| !text.is_empty()))
        }
        "error" => Err(ProviderError::Stream(
            payload.error.map(|e| e.message).unwrap_or_else(|| "unknown error".to_string()),
        )),
        _ => Ok(None),
    }
}

#[async_trait]
impl CompletionProvider for ClaudeProvider {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let request = self.build_request(messages, options);
        tracing::debug!(model = %request.model, max_tokens = request.max_tokens, "Claude request");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(sse_text_stream(response.bytes_stream(), parse_event))
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Claude API request structure.
#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    stream: bool,
}

/// Message in a Claude request.
#[derive(Debug, Serialize)]
struct Message {
    role: Role,
    content: String,
}

/// One streamed event payload.
#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<Delta>,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn event(data: &str) -> SseEvent {
        SseEvent { event: None, data: data.to_string() }
    }

    #[test]
    #[serial(anthropic_env)]
    fn test_claude_provider_creation_fails_without_key() {
        let original = std::env::var("ANTHROPIC_API_KEY").ok();
        std::env::remove_var("ANTHROPIC_API_KEY");

        let result = ClaudeProvider::new();

        if let Some(val) = original {
            std::env::set_var("ANTHROPIC_API_KEY", val);
        }
        assert!(result.is_err());
    }

    #[test]
    #[serial(anthropic_env)]
    fn test_request_moves_system_prompt() {
        let original = std::env::var("ANTHROPIC_API_KEY").ok();
        std::env::set_var("ANTHROPIC_API_KEY", "test-key");
        let provider = ClaudeProvider::new().unwrap().with_model("claude-test");
        match original {
            Some(val) => std::env::set_var("ANTHROPIC_API_KEY", val),
            None => std::env::remove_var("ANTHROPIC_API_KEY"),
        }

        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hello")];
        let request = provider.build_request(&messages, &CompletionOptions::default());

        assert_eq!(request.model, "claude-test");
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.messages.len(), 1);
        assert!(request.stream);
    }

    #[test]
    fn test_parse_text_delta() {
        let text = parse_event(&event(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        ))
        .unwrap();
        assert_eq!(text.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_parse_ignores_other_events() {
        let text = parse_event(&event(r#"{"type":"message_stop"}"#)).unwrap();
        assert!(text.is_none());
    }

    #[test]
    fn test_parse_error_event() {
        let err = parse_event(&event(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}

//! Deterministic provider that replays fixed chunks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use super::{ChatMessage, ChunkStream, CompletionOptions, CompletionProvider, ProviderError};

#[derive(Debug, Clone)]
enum Failure {
    Open { transient: bool, message: String },
    MidStream { after: usize, message: String },
}

/// Provider that answers every request with the same scripted chunks.
///
/// Failures can be injected per call (zero-based call index), and every request
/// is recorded for inspection.
#[derive(Debug)]
pub struct ScriptedProvider {
    chunks: Vec<String>,
    delay: Duration,
    failures: HashMap<usize, Failure>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    /// Create a provider that streams `chunks` for every request.
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            failures: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before each chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make call `call` fail before producing any text.
    pub fn fail_to_open(mut self, call: usize, transient: bool, message: impl Into<String>) -> Self {
        self.failures.insert(call, Failure::Open { transient, message: message.into() });
        self
    }

    /// Make call `call` fail after `after` chunks.
    pub fn fail_mid_stream(mut self, call: usize, after: usize, message: impl Into<String>) -> Self {
        self.failures.insert(call, Failure::MidStream { after, message: message.into() });
        self
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Messages of every request received so far.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<ChunkStream, ProviderError> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(messages.to_vec());
            requests.len() - 1
        };

        let mut items: Vec<Result<String, ProviderError>> =
            self.chunks.iter().cloned().map(Ok).collect();

        match self.failures.get(&call) {
            Some(Failure::Open { transient: true, message }) => {
                return Err(ProviderError::Request(message.clone()));
            }
            Some(Failure::Open { transient: false, message }) => {
                return Err(ProviderError::Api { status: 400, body: message.clone() });
            }
            Some(Failure::MidStream { after, message }) => {
                items.truncate(*after);
                items.push(Err(ProviderError::Stream(message.clone())));
            }
            None => {}
        }

        let delay = self.delay;
        Ok(Box::pin(stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        })))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

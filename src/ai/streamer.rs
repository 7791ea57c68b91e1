//! Cancellable completion streams.
//!
//! [`CompletionStreamer`] opens one completion and hands back an [`ActiveStream`]
//! that yields text chunks in receipt order. Once the [`CancelHandle`] fires, the
//! stream yields no further text: a chunk that arrives after cancellation is
//! discarded, and any error after cancellation is reported as
//! [`StreamError::Cancelled`].

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;

use super::{ChatMessage, ChunkStream, CompletionOptions, CompletionProvider, ProviderError};
use crate::core::{retry_async, RetryConfig};

/// Failure of a completion stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The stream was cancelled by its owner. Not a failure.
    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Shared cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Create a handle that has not been cancelled.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Check whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until cancellation is signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once cancelled.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens completion streams against one provider.
#[derive(Clone)]
pub struct CompletionStreamer {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryConfig,
}

impl CompletionStreamer {
    /// Create a streamer with the default retry policy.
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider, retry: RetryConfig::api() }
    }

    /// Use a specific retry policy for opening streams.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Name of the underlying provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Start a completion.
    ///
    /// Transient connection failures are retried until the first chunk stream is
    /// obtained; cancellation interrupts both the request and any backoff wait.
    pub async fn open(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        cancel: CancelHandle,
    ) -> Result<ActiveStream, StreamError> {
        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        let provider = &self.provider;
        let attempt = retry_async(&self.retry, ProviderError::is_transient, || {
            provider.stream_completion(messages, options)
        });

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StreamError::Cancelled),
            outcome = attempt => outcome,
        };

        if outcome.was_retried() {
            tracing::info!(
                provider = self.provider.name(),
                attempts = outcome.attempts,
                "Completion stream opened after retry"
            );
        }

        let inner = match outcome.into_result() {
            Ok(inner) => inner,
            Err(_) if cancel.is_cancelled() => return Err(StreamError::Cancelled),
            Err(e) => return Err(e.into()),
        };

        if cancel.is_cancelled() {
            return Err(StreamError::Cancelled);
        }
        Ok(ActiveStream { inner: Some(inner), cancel })
    }
}

/// An open completion. Finite and not restartable.
pub struct ActiveStream {
    inner: Option<ChunkStream>,
    cancel: CancelHandle,
}

enum Next {
    Cancelled,
    Item(Option<Result<String, ProviderError>>),
}

impl ActiveStream {
    /// Wait for the next chunk.
    ///
    /// Returns `Ok(None)` once the completion has finished.
    pub async fn next_chunk(&mut self) -> Result<Option<String>, StreamError> {
        if self.cancel.is_cancelled() {
            self.inner = None;
            return Err(StreamError::Cancelled);
        }

        let next = {
            let cancel = &self.cancel;
            let Some(inner) = self.inner.as_mut() else {
                return Ok(None);
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => Next::Cancelled,
                item = inner.next() => Next::Item(item),
            }
        };

        // A chunk that was in flight when cancel() ran is dropped here.
        if matches!(next, Next::Cancelled) || self.cancel.is_cancelled() {
            self.inner = None;
            return Err(StreamError::Cancelled);
        }

        match next {
            Next::Item(Some(Ok(text))) => Ok(Some(text)),
            Next::Item(Some(Err(e))) => {
                self.inner = None;
                Err(e.into())
            }
            Next::Item(None) | Next::Cancelled => {
                self.inner = None;
                Ok(None)
            }
        }
    }

    /// Cancel this stream.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream into one string.
    pub async fn collect_text(mut self) -> Result<String, StreamError> {
        let mut text = String::new();
        while let Some(chunk) = self.next_chunk().await? {
            text.push_str(&chunk);
        }
        Ok(text)
    }
}

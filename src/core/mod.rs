//! Core types shared across Redline.
//!
//! Documents, storage, configuration, and retry policy.

mod config;
mod document;
mod retry;
mod storage;

pub use config::{AiConfig, Config, DiffConfig, OllamaConfig, OpenAIConfig, PipelineConfig};
pub use document::{Document, DocumentRef};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use storage::{DocumentStore, FsStore, StorageError};

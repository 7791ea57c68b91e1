//! Editable documents and references to stored documents.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of editable text owned by an editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Session-unique identifier
    pub id: Uuid,

    /// Name shown to the user (usually the file name)
    pub display_name: String,

    /// Current text content
    pub content: String,

    /// Whether the content differs from what was last persisted
    pub is_dirty: bool,
}

impl Document {
    /// Create a clean document.
    pub fn new(display_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            content: content.into(),
            is_dirty: false,
        }
    }

    /// Replace the content, marking the document dirty when it changed.
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content != self.content {
            self.content = content;
            self.is_dirty = true;
        }
    }

    /// Append text, marking the document dirty.
    pub fn append(&mut self, chunk: &str) {
        if !chunk.is_empty() {
            self.content.push_str(chunk);
            self.is_dirty = true;
        }
    }

    /// Mark the document as persisted.
    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }
}

/// Reference to a document in a [`DocumentStore`](super::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Path relative to the store root
    pub path: PathBuf,

    /// Name shown in status messages
    pub display_name: String,
}

impl DocumentRef {
    /// Create a reference whose display name is the file name.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, display_name }
    }

    /// Override the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Folder containing the document (empty path for the store root).
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// File name without its extension.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display_name.clone())
    }
}

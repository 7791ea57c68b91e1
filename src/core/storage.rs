//! Document storage.
//!
//! The pipeline only ever talks to storage through [`DocumentStore`], so the
//! file system backend can be swapped for an in-memory one in tests.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a document store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path is outside the document root: {0}")]
    OutsideRoot(PathBuf),

    #[error("No revision number left for {0}")]
    RevisionsExhausted(String),
}

/// Storage operations required by the revision pipeline.
///
/// All paths are relative to the store root.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List the entry names in a folder. A missing folder lists as empty.
    async fn list_names(&self, folder: &Path) -> Result<Vec<String>, StorageError>;

    /// Check whether a document exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Create an empty document if none exists. Returns `true` if it was created.
    async fn create(&self, path: &Path) -> Result<bool, StorageError>;

    /// Read a whole document.
    async fn read(&self, path: &Path) -> Result<String, StorageError>;

    /// Replace a whole document.
    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError>;

    /// Resolve a relative path to its location in the backing store.
    fn resolve(&self, path: &Path) -> Result<PathBuf, StorageError>;
}

/// File system store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn list_names(&self, folder: &Path) -> Result<Vec<String>, StorageError> {
        let dir = self.resolve(folder)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::List { path: dir, source }),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(source) => return Err(StorageError::List { path: dir, source }),
            }
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn create(&self, path: &Path) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Create { path: full.clone(), source })?;
        }

        match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&full).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(source) => Err(StorageError::Create { path: full, source }),
        }
    }

    async fn read(&self, path: &Path) -> Result<String, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full).await.map_err(|source| StorageError::Read { path: full, source })
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::write(&full, content).await.map_err(|source| StorageError::Write { path: full, source })
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let escapes = path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(StorageError::OutsideRoot(path.to_path_buf()));
        }
        Ok(self.root.join(path))
    }
}

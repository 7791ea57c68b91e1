//! Observable pipeline state.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::Document;

/// Lifecycle of a revision job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// No job has been started, or the last one was reset
    #[default]
    Idle,
    /// A document is being revised
    Running,
    /// Waiting for `resume()` between documents
    Paused,
    /// Stopped by the user
    Cancelled,
    /// Every document was revised
    Complete,
    /// A document failed; see the error message
    Error,
}

impl JobStatus {
    /// Whether the job has finished, one way or another.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Complete | Self::Error)
    }

    /// Whether a job currently owns the pipeline.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Complete => write!(f, "complete"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// What happens after each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvanceMode {
    /// Continue straight to the next document
    #[default]
    Auto,
    /// Pause for review before the next document
    Pause,
}

impl fmt::Display for AdvanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Pause => write!(f, "pause"),
        }
    }
}

impl FromStr for AdvanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "pause" => Ok(Self::Pause),
            other => Err(format!("unknown advance mode '{}' (expected auto or pause)", other)),
        }
    }
}

/// Snapshot published to observers on every state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub status: JobStatus,

    /// Zero-based index of the current (or last processed) document
    pub current_index: usize,

    pub total_files: usize,

    /// Display name of the current document
    pub current_file_name: Option<String>,

    pub advance_mode: AdvanceMode,

    /// Set only when `status` is `Error`
    pub error_message: Option<String>,
}

/// Side-by-side view of the document being revised.
///
/// `revised` grows chunk by chunk while the document streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveView {
    /// Position of the document in the queue
    pub index: usize,

    pub source: Document,

    pub revised: Document,

    /// Store-relative path of the revised sibling
    pub revised_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_and_active() {
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
        assert!(JobStatus::Paused.is_active());
        assert!(!JobStatus::Idle.is_active());
    }

    #[test]
    fn test_advance_mode_parse() {
        assert_eq!("Pause".parse::<AdvanceMode>().unwrap(), AdvanceMode::Pause);
        assert!("later".parse::<AdvanceMode>().is_err());
        assert_eq!(AdvanceMode::Auto.to_string(), "auto");
    }
}

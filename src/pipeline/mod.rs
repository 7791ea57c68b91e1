//! Revision pipeline.
//!
//! Revises a batch of documents one after another: each document gets its own
//! guidance brief, a fresh `-revNN` sibling, and a streamed completion whose text
//! is visible through the live view as it arrives.
//!
//! ## State machine
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            +-> Complete | Cancelled | Error  --reset--> Idle
//! ```

mod namer;
mod prompt;
mod runner;
mod status;

pub use namer::{is_revision_name, next_revision_name, next_revision_path, revision_base};
pub use prompt::{revision_messages, SYSTEM_BRIEF};
pub use runner::{PipelineContext, PipelineError, RevisionPipeline};
pub use status::{AdvanceMode, JobStatus, LiveView, PipelineStatus};

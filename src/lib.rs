#![allow(clippy::needless_collect)]
#![allow(clippy::format_push_string)]
#![allow(clippy::unused_self)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::unnecessary_lazy_evaluations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # Redline
//!
//! AI-assisted batch revision of manuscript documents, with a paragraph-level
//! diff and merge engine for reconciling each revision against its original.
//!
//! ## Features
//!
//! - **Revision pipeline**: Streams AI rewrites for a queue of documents, one at a
//!   time, with pause, resume, and cancel
//! - **Guidance**: Builds per-document briefs from analysis data (dimension gaps,
//!   story-beat checklists) or free text
//! - **Alignment**: Matches rewritten paragraphs to their originals with a fuzzy
//!   word-overlap predicate and shows word-level changes
//! - **Merge**: Accept, reject, edit, and revert individual paragraphs
//!
//! ## Quick Start
//!
//! ```bash
//! # Revise every chapter, pausing after each one
//! redline revise chapters/ --analysis analysis.json --pause
//!
//! # Compare a revision with its original
//! redline diff chapters/01-arrival.md chapters/01-arrival-rev01.md
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]
#![allow(clippy::float_cmp)]

pub mod ai;
pub mod core;
pub mod diff;
pub mod guidance;
pub mod pipeline;

// Re-export commonly used types
pub use ai::{CancelHandle, CompletionProvider, CompletionStreamer, ProviderError, StreamError};
pub use core::{Config, Document, DocumentRef, DocumentStore, FsStore, StorageError};
pub use diff::{Alignment, DiffRow, MergeSession, RowKind, Side};
pub use guidance::{AnalysisIndex, GuidanceBuilder, GuidanceKind};
pub use pipeline::{AdvanceMode, JobStatus, PipelineContext, PipelineStatus, RevisionPipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "redline";

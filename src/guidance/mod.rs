//! Revision guidance.
//!
//! Turns analysis records (dimension gaps, story-beat checklists) or a free-text
//! instruction into the brief sent with each document.

mod analysis;
mod builder;

pub use analysis::{
    Adjustment, AnalysisIndex, AnalysisRecord, ChecklistItem, DimensionScore, Direction, Priority,
};
pub use builder::{GuidanceBuilder, GuidanceKind, RevisionGuidance, GENERIC_BRIEF};

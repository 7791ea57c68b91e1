//! Paragraph diff and merge.
//!
//! Text is split into paragraphs ([`segment`]), the two paragraph sequences are
//! aligned into typed rows ([`align_with`]), and [`MergeSession`] applies merge
//! actions by rebuilding documents from those rows.

mod align;
mod merge;
mod plain_text;
mod render;
mod segment;

pub use align::{
    align, align_texts, align_with, word_overlap, word_spans, AlignOptions, Alignment,
    AlignmentStats, DiffRow, RowKind, Span, SpanKind, DEFAULT_THRESHOLD,
};
pub use merge::{MergeError, MergeSession, Side, DEFAULT_MAX_HISTORY};
pub use plain_text::to_plain_text;
pub use render::{render_text, stats_line};
pub use segment::{join_paragraphs, segment};

//! Paragraph alignment.
//!
//! Two paragraph sequences are aligned with Myers' algorithm under a fuzzy
//! equality: paragraphs match when identical or when their word overlap exceeds
//! the threshold. Matched pairs that differ become `Changed` rows with word-level
//! spans. Adjacent removed and added runs are paired up positionally.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use similar::algorithms::{myers, Capture};
use similar::{capture_diff_slices, Algorithm, DiffTag};

use super::segment::segment;

/// Default word-overlap threshold for fuzzy paragraph equality.
pub const DEFAULT_THRESHOLD: f64 = 0.4;

/// A word with its trailing whitespace, or leading whitespace at the start.
static WORD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+|\S+\s*").expect("valid word token pattern"));

/// Kind of an aligned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Equal,
    Changed,
    Added,
    Removed,
}

/// Kind of a word-level span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Equal,
    Added,
    Removed,
}

/// Contiguous run of words with the same status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
}

/// One aligned comparison unit.
///
/// `Equal` and `Changed` rows carry both texts, `Added` only the right text, and
/// `Removed` only the left text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
    pub kind: RowKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_text: Option<String>,

    /// Equal and removed spans of the left text (changed rows only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_spans: Option<Vec<Span>>,

    /// Equal and added spans of the right text (changed rows only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_spans: Option<Vec<Span>>,
}

impl DiffRow {
    fn equal(left: &str, right: &str) -> Self {
        Self {
            kind: RowKind::Equal,
            left_text: Some(left.to_string()),
            right_text: Some(right.to_string()),
            left_spans: None,
            right_spans: None,
        }
    }

    fn added(right: &str) -> Self {
        Self {
            kind: RowKind::Added,
            left_text: None,
            right_text: Some(right.to_string()),
            left_spans: None,
            right_spans: None,
        }
    }

    fn removed(left: &str) -> Self {
        Self {
            kind: RowKind::Removed,
            left_text: Some(left.to_string()),
            right_text: None,
            left_spans: None,
            right_spans: None,
        }
    }

    /// Text on one side, if the row has it.
    pub fn text(&self, side: super::Side) -> Option<&str> {
        match side {
            super::Side::Left => self.left_text.as_deref(),
            super::Side::Right => self.right_text.as_deref(),
        }
    }
}

/// Summary counts over an alignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentStats {
    /// Characters in added spans and added paragraphs
    pub added_chars: usize,

    /// Characters in removed spans and removed paragraphs
    pub removed_chars: usize,

    /// Number of non-equal rows
    pub change_count: usize,
}

/// Rows and stats for two paragraph sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Alignment {
    pub rows: Vec<DiffRow>,
    pub stats: AlignmentStats,
}

impl Alignment {
    /// Whether both sides are the same.
    pub fn is_identical(&self) -> bool {
        self.stats.change_count == 0
    }
}

/// Alignment tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignOptions {
    /// Word overlap above which two paragraphs are considered the same paragraph
    pub threshold: f64,

    /// Attach word-level spans to changed rows
    pub word_diff: bool,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self { threshold: DEFAULT_THRESHOLD, word_diff: true }
    }
}

/// Ratio of shared lowercase words to the size of the larger word set.
///
/// Identical strings always score 1.0; two strings without words score 0.0.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    set_overlap(&word_set(a), &word_set(b))
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn set_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / larger as f64
}

/// Paragraph compared with the fuzzy predicate.
struct Fuzzy<'a> {
    text: &'a str,
    words: HashSet<String>,
    threshold: f64,
}

impl<'a> Fuzzy<'a> {
    fn new(text: &'a str, threshold: f64) -> Self {
        Self { text, words: word_set(text), threshold }
    }
}

impl PartialEq for Fuzzy<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text || set_overlap(&self.words, &other.words) > self.threshold
    }
}

/// Align two paragraph sequences with default options.
pub fn align<S: AsRef<str>>(left: &[S], right: &[S]) -> Alignment {
    align_with(left, right, &AlignOptions::default())
}

/// Segment two texts and align their paragraphs.
pub fn align_texts(left: &str, right: &str, options: &AlignOptions) -> Alignment {
    align_with(&segment(left), &segment(right), options)
}

/// Align two paragraph sequences.
pub fn align_with<S: AsRef<str>>(left: &[S], right: &[S], options: &AlignOptions) -> Alignment {
    let old: Vec<Fuzzy<'_>> = left.iter().map(|p| Fuzzy::new(p.as_ref(), options.threshold)).collect();
    let new: Vec<Fuzzy<'_>> = right.iter().map(|p| Fuzzy::new(p.as_ref(), options.threshold)).collect();

    let mut capture = Capture::new();
    myers::diff(&mut capture, &old, 0..old.len(), &new, 0..new.len())
        .unwrap_or_else(|never| match never {});

    let mut builder = RowBuilder { options, alignment: Alignment::default() };
    let mut removed: Vec<&str> = Vec::new();
    let mut added: Vec<&str> = Vec::new();

    for op in capture.into_ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                builder.flush(&mut removed, &mut added);
                for (l, r) in old[old_range].iter().zip(&new[new_range]) {
                    builder.pair(l.text, r.text);
                }
            }
            DiffTag::Delete | DiffTag::Insert | DiffTag::Replace => {
                removed.extend(old[old_range].iter().map(|p| p.text));
                added.extend(new[new_range].iter().map(|p| p.text));
            }
        }
    }
    builder.flush(&mut removed, &mut added);

    builder.alignment
}

struct RowBuilder<'o> {
    options: &'o AlignOptions,
    alignment: Alignment,
}

impl RowBuilder<'_> {
    fn push(&mut self, row: DiffRow) {
        if row.kind != RowKind::Equal {
            self.alignment.stats.change_count += 1;
        }
        self.alignment.rows.push(row);
    }

    /// Row for two matched paragraphs.
    fn pair(&mut self, left: &str, right: &str) {
        if left == right {
            self.push(DiffRow::equal(left, right));
            return;
        }

        let (left_spans, right_spans) = word_spans(left, right);
        let stats = &mut self.alignment.stats;
        stats.added_chars += span_chars(&right_spans, SpanKind::Added);
        stats.removed_chars += span_chars(&left_spans, SpanKind::Removed);

        let word_diff = self.options.word_diff;
        self.push(DiffRow {
            kind: RowKind::Changed,
            left_text: Some(left.to_string()),
            right_text: Some(right.to_string()),
            left_spans: word_diff.then_some(left_spans),
            right_spans: word_diff.then_some(right_spans),
        });
    }

    /// Emit a pending removed/added block, pairing elements positionally.
    fn flush(&mut self, removed: &mut Vec<&str>, added: &mut Vec<&str>) {
        let paired = removed.len().min(added.len());
        for (l, r) in removed.iter().zip(added.iter()) {
            self.pair(l, r);
        }
        for l in &removed[paired..] {
            self.alignment.stats.removed_chars += l.chars().count();
            self.push(DiffRow::removed(l));
        }
        for r in &added[paired..] {
            self.alignment.stats.added_chars += r.chars().count();
            self.push(DiffRow::added(r));
        }
        removed.clear();
        added.clear();
    }
}

fn span_chars(spans: &[Span], kind: SpanKind) -> usize {
    spans.iter().filter(|s| s.kind == kind).map(|s| s.text.chars().count()).sum()
}

/// Word-level spans for a changed pair.
///
/// Words are compared without their trailing whitespace; each span keeps the
/// whitespace of its own side.
pub fn word_spans(left: &str, right: &str) -> (Vec<Span>, Vec<Span>) {
    let old = tokens(left);
    let new = tokens(right);
    let old_keys: Vec<&str> = old.iter().map(|t| t.trim_end()).collect();
    let new_keys: Vec<&str> = new.iter().map(|t| t.trim_end()).collect();

    let mut left_spans = Vec::new();
    let mut right_spans = Vec::new();

    for op in capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let old_text = old[old_range].concat();
        let new_text = new[new_range].concat();
        match tag {
            DiffTag::Equal => {
                push_span(&mut left_spans, SpanKind::Equal, old_text);
                push_span(&mut right_spans, SpanKind::Equal, new_text);
            }
            DiffTag::Delete => push_span(&mut left_spans, SpanKind::Removed, old_text),
            DiffTag::Insert => push_span(&mut right_spans, SpanKind::Added, new_text),
            DiffTag::Replace => {
                push_span(&mut left_spans, SpanKind::Removed, old_text);
                push_span(&mut right_spans, SpanKind::Added, new_text);
            }
        }
    }

    (left_spans, right_spans)
}

fn tokens(text: &str) -> Vec<&str> {
    WORD_TOKEN.find_iter(text).map(|m| m.as_str()).collect()
}

fn push_span(spans: &mut Vec<Span>, kind: SpanKind, text: String) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(last) if last.kind == kind => last.text.push_str(&text),
        _ => spans.push(Span { kind, text }),
    }
}

//! Merge actions over an aligned pair of documents.
//!
//! The documents are the source of truth. Every action rebuilds one document
//! from the current rows, then both documents are re-segmented and re-aligned.

use std::collections::VecDeque;
use std::fmt;

use thiserror::Error;

use super::align::{align_texts, AlignOptions, Alignment, AlignmentStats, DiffRow};
use super::segment::join_paragraphs;
use crate::core::Document;

/// Default number of revertible operations.
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Which document of the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The original
    Left,
    /// The revision
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

/// Errors from merge actions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("Row {index} is out of range ({len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Row {index} cannot be accepted from both sides")]
    ConflictingRow { index: usize },
}

/// Document contents before an operation.
#[derive(Debug, Clone)]
struct Snapshot {
    left: String,
    right: String,
}

/// Two documents under comparison plus their current alignment.
#[derive(Debug, Clone)]
pub struct MergeSession {
    left: Document,
    right: Document,
    options: AlignOptions,
    alignment: Alignment,
    history: VecDeque<Snapshot>,
    max_history: usize,
}

impl MergeSession {
    /// Start a session over two documents.
    pub fn new(left: Document, right: Document, options: AlignOptions) -> Self {
        let alignment = align_texts(&left.content, &right.content, &options);
        Self {
            left,
            right,
            options,
            alignment,
            history: VecDeque::new(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    /// Keep at most `max` revertible operations.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self.history.truncate(max);
        self
    }

    pub fn left(&self) -> &Document {
        &self.left
    }

    pub fn right(&self) -> &Document {
        &self.right
    }

    pub fn document(&self, side: Side) -> &Document {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn rows(&self) -> &[DiffRow] {
        &self.alignment.rows
    }

    pub fn stats(&self) -> AlignmentStats {
        self.alignment.stats
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    /// Number of operations that can be reverted.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Hand back both documents.
    pub fn into_documents(self) -> (Document, Document) {
        (self.left, self.right)
    }

    /// Take the right text of one row into the left document.
    ///
    /// A removed row (no right text) is dropped from the left document.
    pub fn accept_right(&mut self, index: usize) -> Result<bool, MergeError> {
        self.check_row(index)?;
        let paragraphs = self.rebuild(Side::Left, &[index], Side::Right);
        tracing::debug!(row = index, "Accept right");
        Ok(self.apply(Side::Left, paragraphs))
    }

    /// Take the left text of one row into the right document.
    ///
    /// An added row (no left text) is dropped from the right document.
    pub fn accept_left(&mut self, index: usize) -> Result<bool, MergeError> {
        self.check_row(index)?;
        let paragraphs = self.rebuild(Side::Right, &[index], Side::Left);
        tracing::debug!(row = index, "Accept left");
        Ok(self.apply(Side::Right, paragraphs))
    }

    /// Accept several rows in one operation, all indices read from the
    /// current alignment.
    ///
    /// Rows in `accept_right` take their right text into the left document and
    /// rows in `accept_left` take their left text into the right document. A row
    /// named in both lists is an error. One revert undoes the whole batch.
    pub fn accept_rows(&mut self, accept_right: &[usize], accept_left: &[usize]) -> Result<bool, MergeError> {
        for &index in accept_right.iter().chain(accept_left) {
            self.check_row(index)?;
        }
        if let Some(&index) = accept_right.iter().find(|i| accept_left.contains(i)) {
            return Err(MergeError::ConflictingRow { index });
        }

        let left = join_paragraphs(&self.rebuild(Side::Left, accept_right, Side::Right));
        let right = join_paragraphs(&self.rebuild(Side::Right, accept_left, Side::Left));
        if left == self.left.content && right == self.right.content {
            return Ok(false);
        }

        tracing::debug!(right = accept_right.len(), left = accept_left.len(), "Accept rows");
        self.record();
        self.left.set_content(left);
        self.right.set_content(right);
        self.realign();
        Ok(true)
    }

    /// Replace the left document with every right paragraph.
    pub fn accept_all(&mut self) -> bool {
        let paragraphs = self.side_paragraphs(Side::Right);
        tracing::debug!(paragraphs = paragraphs.len(), "Accept all");
        self.apply(Side::Left, paragraphs)
    }

    /// Replace the right document with every left paragraph.
    pub fn reject_all(&mut self) -> bool {
        let paragraphs = self.side_paragraphs(Side::Left);
        tracing::debug!(paragraphs = paragraphs.len(), "Reject all");
        self.apply(Side::Right, paragraphs)
    }

    /// Replace the text of one row on one side. Empty text removes the paragraph.
    ///
    /// Editing the missing side of an added or removed row inserts the paragraph
    /// at that row's position. Returns `false` when nothing changed.
    pub fn edit_row(&mut self, index: usize, side: Side, text: &str) -> Result<bool, MergeError> {
        self.check_row(index)?;
        let current = self.alignment.rows[index].text(side);
        if current == Some(text) || (current.is_none() && text.trim().is_empty()) {
            return Ok(false);
        }

        let paragraphs: Vec<String> = self
            .alignment
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                if i == index {
                    Some(text.trim()).filter(|t| !t.is_empty()).map(str::to_string)
                } else {
                    row.text(side).map(str::to_string)
                }
            })
            .collect();

        tracing::debug!(row = index, %side, "Edit row");
        Ok(self.apply(side, paragraphs))
    }

    /// Replace a whole document, as a direct user edit.
    pub fn set_content(&mut self, side: Side, content: impl Into<String>) -> bool {
        let content = content.into();
        if self.document(side).content == content {
            return false;
        }
        self.record();
        self.document_mut(side).set_content(content);
        self.realign();
        true
    }

    /// Undo the most recent operation. Returns `false` if there is none.
    pub fn revert(&mut self) -> bool {
        let Some(snapshot) = self.history.pop_back() else {
            return false;
        };
        self.left.set_content(snapshot.left);
        self.right.set_content(snapshot.right);
        self.realign();
        tracing::debug!(remaining = self.history.len(), "Reverted merge operation");
        true
    }

    fn check_row(&self, index: usize) -> Result<(), MergeError> {
        let len = self.alignment.rows.len();
        if index >= len {
            return Err(MergeError::RowOutOfRange { index, len });
        }
        Ok(())
    }

    /// Paragraphs of `target` with the rows in `indices` taken from `source`.
    fn rebuild(&self, target: Side, indices: &[usize], source: Side) -> Vec<String> {
        self.alignment
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| if indices.contains(&i) { row.text(source) } else { row.text(target) })
            .map(str::to_string)
            .collect()
    }

    fn side_paragraphs(&self, side: Side) -> Vec<String> {
        self.alignment.rows.iter().filter_map(|row| row.text(side)).map(str::to_string).collect()
    }

    fn apply(&mut self, side: Side, paragraphs: Vec<String>) -> bool {
        let content = join_paragraphs(&paragraphs);
        if self.document(side).content == content {
            return false;
        }
        self.record();
        self.document_mut(side).set_content(content);
        self.realign();
        true
    }

    fn record(&mut self) {
        if self.max_history == 0 {
            return;
        }
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(Snapshot {
            left: self.left.content.clone(),
            right: self.right.content.clone(),
        });
    }

    fn document_mut(&mut self, side: Side) -> &mut Document {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    fn realign(&mut self) {
        self.alignment = align_texts(&self.left.content, &self.right.content, &self.options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{segment, RowKind};

    fn session(left: &str, right: &str) -> MergeSession {
        MergeSession::new(
            Document::new("left.md", left),
            Document::new("right.md", right),
            AlignOptions::default(),
        )
    }

    fn kinds(session: &MergeSession) -> Vec<RowKind> {
        session.rows().iter().map(|r| r.kind).collect()
    }

    const LEFT: &str = "The cat sat on the mat.\n\nIt was raining.\n\nThe end.";
    const RIGHT: &str = "The cat sat quietly on the mat.\n\nThe end.\n\nAn epilogue appears.";

    #[test]
    fn test_initial_rows() {
        let s = session(LEFT, RIGHT);
        assert_eq!(kinds(&s), vec![RowKind::Changed, RowKind::Removed, RowKind::Equal, RowKind::Added]);
    }

    #[test]
    fn test_accept_right_changed_row() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.accept_right(0).unwrap());

        assert_eq!(s.left().content, "The cat sat quietly on the mat.\n\nIt was raining.\n\nThe end.");
        assert!(s.left().is_dirty);
        assert_eq!(s.rows()[0].kind, RowKind::Equal);
    }

    #[test]
    fn test_accept_right_removed_row_drops_it() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.accept_right(1).unwrap());
        assert_eq!(s.left().content, "The cat sat on the mat.\n\nThe end.");
    }

    #[test]
    fn test_accept_right_added_row_inserts_it() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.accept_right(3).unwrap());
        assert!(s.left().content.ends_with("The end.\n\nAn epilogue appears."));
    }

    #[test]
    fn test_accept_left_mirrors() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.accept_left(1).unwrap());
        assert_eq!(
            s.right().content,
            "The cat sat quietly on the mat.\n\nIt was raining.\n\nThe end.\n\nAn epilogue appears."
        );

        assert!(s.accept_left(3).unwrap());
        assert_eq!(s.right().content, "The cat sat quietly on the mat.\n\nIt was raining.\n\nThe end.");
    }

    #[test]
    fn test_accept_all_is_idempotent() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.accept_all());
        assert!(s.rows().iter().all(|r| r.kind == RowKind::Equal));
        assert_eq!(segment(&s.left().content), segment(RIGHT));

        assert!(!s.accept_all());
        assert_eq!(s.history_len(), 1);
    }

    #[test]
    fn test_reject_all() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.reject_all());
        assert_eq!(s.right().content, LEFT);
        assert_eq!(s.stats().change_count, 0);
    }

    #[test]
    fn test_edit_row() {
        let mut s = session(LEFT, RIGHT);
        assert!(!s.edit_row(2, Side::Left, "The end.").unwrap());

        assert!(s.edit_row(2, Side::Left, "The very end.").unwrap());
        assert_eq!(s.left().content, "The cat sat on the mat.\n\nIt was raining.\n\nThe very end.");
    }

    #[test]
    fn test_edit_row_empty_removes_paragraph() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.edit_row(1, Side::Left, "  ").unwrap());
        assert_eq!(s.left().content, "The cat sat on the mat.\n\nThe end.");
    }

    #[test]
    fn test_edit_missing_side_inserts() {
        let mut s = session(LEFT, RIGHT);
        assert!(!s.edit_row(3, Side::Left, "").unwrap());
        assert!(s.edit_row(3, Side::Left, "An epilogue appears.").unwrap());
        assert!(s.left().content.ends_with("An epilogue appears."));
    }

    #[test]
    fn test_out_of_range() {
        let mut s = session(LEFT, RIGHT);
        assert_eq!(s.accept_right(9), Err(MergeError::RowOutOfRange { index: 9, len: 4 }));
        assert!(s.edit_row(4, Side::Right, "x").is_err());
    }

    #[test]
    fn test_accept_rows_reads_indices_from_one_alignment() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.accept_rows(&[1], &[3]).unwrap());

        assert_eq!(s.left().content, "The cat sat on the mat.\n\nThe end.");
        assert_eq!(s.right().content, "The cat sat quietly on the mat.\n\nThe end.");
        assert_eq!(kinds(&s), vec![RowKind::Changed, RowKind::Equal]);

        assert_eq!(s.history_len(), 1);
        assert!(s.revert());
        assert_eq!(s.left().content, LEFT);
        assert_eq!(s.right().content, RIGHT);
    }

    #[test]
    fn test_accept_rows_rejects_bad_input() {
        let mut s = session(LEFT, RIGHT);
        assert_eq!(s.accept_rows(&[0, 2], &[2]), Err(MergeError::ConflictingRow { index: 2 }));
        assert_eq!(s.accept_rows(&[1], &[7]), Err(MergeError::RowOutOfRange { index: 7, len: 4 }));
        assert_eq!(s.left().content, LEFT);
        assert_eq!(s.history_len(), 0);
    }

    #[test]
    fn test_accept_rows_without_change() {
        let mut s = session(LEFT, RIGHT);
        assert!(!s.accept_rows(&[2], &[]).unwrap());
        assert!(!s.accept_rows(&[], &[]).unwrap());
        assert_eq!(s.history_len(), 0);
    }

    #[test]
    fn test_revert_steps_back() {
        let mut s = session(LEFT, RIGHT);
        assert!(!s.revert());

        s.accept_right(0).unwrap();
        s.reject_all();
        assert_eq!(s.history_len(), 2);

        assert!(s.revert());
        assert_eq!(s.right().content, RIGHT);
        assert!(s.revert());
        assert_eq!(s.left().content, LEFT);
        assert_eq!(kinds(&s), vec![RowKind::Changed, RowKind::Removed, RowKind::Equal, RowKind::Added]);
        assert!(!s.revert());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut s = session(LEFT, RIGHT).with_max_history(1);
        s.accept_right(0).unwrap();
        s.accept_right(1).unwrap();
        assert_eq!(s.history_len(), 1);

        let mut none = session(LEFT, RIGHT).with_max_history(0);
        none.accept_all();
        assert!(!none.revert());
    }

    #[test]
    fn test_set_content_realigns() {
        let mut s = session(LEFT, RIGHT);
        assert!(s.set_content(Side::Right, LEFT));
        assert_eq!(s.stats().change_count, 0);
        assert!(!s.set_content(Side::Right, LEFT));
    }
}

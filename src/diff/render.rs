//! Terminal rendering of aligned rows.

use std::fmt::Write as _;

use crossterm::style::Stylize;

use super::align::{Alignment, AlignmentStats, DiffRow, RowKind, Span, SpanKind};

/// Render every row followed by the stats line.
///
/// With `color`, spans are styled with ANSI colours; without it, added and
/// removed words are bracketed as `[+..+]` and `[-..-]`.
pub fn render_text(alignment: &Alignment, color: bool) -> String {
    let mut out = String::new();
    for (index, row) in alignment.rows.iter().enumerate() {
        render_row(&mut out, index, row, color);
    }
    let _ = writeln!(out, "{}", stats_line(&alignment.stats));
    out
}

/// One-line summary of an alignment.
pub fn stats_line(stats: &AlignmentStats) -> String {
    let noun = if stats.change_count == 1 { "change" } else { "changes" };
    format!(
        "{} {}, +{} -{} chars",
        stats.change_count, noun, stats.added_chars, stats.removed_chars
    )
}

fn render_row(out: &mut String, index: usize, row: &DiffRow, color: bool) {
    let left = row.left_text.as_deref().unwrap_or_default();
    let right = row.right_text.as_deref().unwrap_or_default();

    match row.kind {
        RowKind::Equal => {
            let _ = writeln!(out, "{:>4} = {}", index, indent(left));
        }
        RowKind::Removed => {
            let _ = writeln!(out, "{:>4} - {}", index, paint(left, SpanKind::Removed, color));
        }
        RowKind::Added => {
            let _ = writeln!(out, "{:>4} + {}", index, paint(right, SpanKind::Added, color));
        }
        RowKind::Changed => {
            let left = match &row.left_spans {
                Some(spans) => render_spans(spans, color),
                None => paint(left, SpanKind::Removed, color),
            };
            let right = match &row.right_spans {
                Some(spans) => render_spans(spans, color),
                None => paint(right, SpanKind::Added, color),
            };
            let _ = writeln!(out, "{:>4} ~ {}", index, left);
            let _ = writeln!(out, "       {}", right);
        }
    }
    out.push('\n');
}

fn render_spans(spans: &[Span], color: bool) -> String {
    let text: String = spans
        .iter()
        .map(|span| match (span.kind, color) {
            (SpanKind::Equal, _) => span.text.clone(),
            (kind, true) => paint(&span.text, kind, true),
            (SpanKind::Added, false) => format!("[+{}+]", span.text),
            (SpanKind::Removed, false) => format!("[-{}-]", span.text),
        })
        .collect();
    indent(&text)
}

fn paint(text: &str, kind: SpanKind, color: bool) -> String {
    let text = indent(text);
    if !color {
        return text;
    }
    match kind {
        SpanKind::Added => text.green().to_string(),
        SpanKind::Removed => text.red().to_string(),
        SpanKind::Equal => text,
    }
}

/// Indent continuation lines under the row marker.
fn indent(text: &str) -> String {
    text.replace('\n', "\n       ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::align;

    #[test]
    fn test_plain_markers() {
        let alignment = align(
            &["Same.", "The cat sat on the mat.", "Gone."],
            &["Same.", "The cat sat quietly on the mat."],
        );
        let text = render_text(&alignment, false);

        assert!(text.contains("   0 = Same.\n"));
        assert!(text.contains("   1 ~ The cat sat on the mat.\n"));
        assert!(text.contains("       The cat sat [+quietly +]on the mat.\n"));
        assert!(text.contains("   2 - Gone.\n"));
        assert!(text.ends_with("2 changes, +8 -5 chars\n"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_color_drops_brackets() {
        let alignment = align(&["old words"], &["new text"]);
        let text = render_text(&alignment, true);
        assert!(text.contains("new text"));
        assert!(!text.contains("[+"));
    }

    #[test]
    fn test_stats_line_singular() {
        let stats = AlignmentStats { added_chars: 3, removed_chars: 0, change_count: 1 };
        assert_eq!(stats_line(&stats), "1 change, +3 -0 chars");
    }
}

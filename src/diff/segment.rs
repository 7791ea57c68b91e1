//! Paragraph segmentation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Two or more line breaks, allowing whitespace-only lines in between.
static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n)+").expect("valid blank line pattern"));

/// Split plain text into paragraphs.
///
/// Paragraphs are separated by blank lines. Text without any blank line but with
/// line breaks is split on single line breaks instead. Paragraphs are trimmed and
/// empty ones dropped.
pub fn segment(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n");

    let paragraphs = collect_trimmed(BLANK_LINES.split(&text));
    if paragraphs.len() <= 1 && text.contains('\n') {
        return collect_trimmed(text.split('\n'));
    }
    paragraphs
}

/// Join paragraphs back into a document.
pub fn join_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> String {
    paragraphs.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n\n")
}

fn collect_trimmed<'a>(parts: impl Iterator<Item = &'a str>) -> Vec<String> {
    parts.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

//! Rich text to plain text conversion.
//!
//! Editors hand us HTML; segmentation needs plain text with paragraph
//! boundaries intact.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(?:\s[^<>]*)?/?>").expect("valid tag pattern"));

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break pattern"));

static BLOCK_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(?:p|div|h[1-6]|li|blockquote|pre|ul|ol|tr|table|section|article)\s*>")
        .expect("valid block end pattern")
});

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity pattern"));

static EXTRA_BREAKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+").expect("valid break run pattern"));

/// Convert HTML content to plain text. Text without tags is returned unchanged.
pub fn to_plain_text(content: &str) -> String {
    if !TAG.is_match(content) {
        return content.to_string();
    }

    let text = content.replace("\r\n", "\n");
    let text = LINE_BREAK.replace_all(&text, "\n\n");
    let text = BLOCK_END.replace_all(&text, "\n\n");
    let text = TAG.replace_all(&text, "");
    let text = ENTITY.replace_all(&text, |caps: &Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    let text = EXTRA_BREAKS.replace_all(&text, "\n\n");

    text.trim().to_string()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let decoded = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        _ => return None,
    };
    Some(decoded.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::segment;

    #[test]
    fn test_plain_text_unchanged() {
        let text = "a < b and c > d\n\nNext.";
        assert_eq!(to_plain_text(text), text);
    }

    #[test]
    fn test_blocks_become_paragraphs() {
        let html = "<h1>Title</h1><p>First <em>para</em>.</p><p>Second&nbsp;para &amp; more.</p>";
        assert_eq!(to_plain_text(html), "Title\n\nFirst para.\n\nSecond para & more.");
    }

    #[test]
    fn test_line_breaks_are_boundaries() {
        let html = "<p>Line one<br>Line two<br/>Line three</p>";
        assert_eq!(segment(&to_plain_text(html)), vec!["Line one", "Line two", "Line three"]);
    }

    #[test]
    fn test_numeric_and_unknown_entities() {
        assert_eq!(to_plain_text("<p>&#39;hi&#x21;&bogus;</p>"), "'hi!&bogus;");
    }
}

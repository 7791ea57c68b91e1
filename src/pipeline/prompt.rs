//! Messages sent to the completion provider for one document.

use crate::ai::ChatMessage;
use crate::guidance::RevisionGuidance;

/// System prompt for every revision request.
pub const SYSTEM_BRIEF: &str = "\
You are an experienced fiction editor revising a manuscript chapter. \
Rewrite the source text following the revision guidance. \
Return only the full revised text in Markdown, with paragraphs separated by blank lines. \
Do not add commentary, headings, or notes about what you changed.";

/// Build the request for one document.
pub fn revision_messages(guidance: &RevisionGuidance, source: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_BRIEF),
        ChatMessage::user(format!(
            "## Revision guidance\n\n{}\n\n## Source text\n\n{}",
            guidance.rendered_brief.trim_end(),
            source
        )),
    ]
}

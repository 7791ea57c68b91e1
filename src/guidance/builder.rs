//! Revision brief rendering.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::analysis::{AnalysisRecord, ChecklistItem, DimensionScore, Direction};

/// Brief used whenever a document has no usable guidance material.
pub const GENERIC_BRIEF: &str = "\
Improve the craft of this passage while keeping its plot, characters, point of view, and voice intact.

- Polish the prose: tighten loose sentences, cut filler and repetition, and sharpen word choice.
- Show, don't tell: replace summarized emotion and exposition with concrete action, sensory detail, and subtext.
- Strengthen dialogue: make each speaker distinct, trim small talk, and let lines carry conflict or intent.
- Fix pacing: slow down for moments that matter and compress transitions that do not.
- Deepen interiority: give the viewpoint character specific thoughts, reactions, and stakes on the page.";

/// What kind of guidance to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceKind {
    /// Flagged story-beat checklist items
    Checklist,
    /// Dimension gap table
    Gaps,
    /// Checklist followed by gaps
    #[default]
    Both,
    /// User-supplied instruction
    Custom,
}

impl fmt::Display for GuidanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checklist => write!(f, "checklist"),
            Self::Gaps => write!(f, "gaps"),
            Self::Both => write!(f, "both"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for GuidanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checklist" => Ok(Self::Checklist),
            "gaps" => Ok(Self::Gaps),
            "both" => Ok(Self::Both),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown guidance kind '{}' (expected checklist, gaps, both, or custom)", other)),
        }
    }
}

/// Rendered instructions for revising one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionGuidance {
    /// Kind of guidance actually rendered
    pub kind: GuidanceKind,

    /// Text sent to the provider
    pub rendered_brief: String,

    /// Whether the generic brief was substituted for missing material
    pub is_fallback: bool,
}

impl RevisionGuidance {
    fn generic() -> Self {
        Self { kind: GuidanceKind::Custom, rendered_brief: GENERIC_BRIEF.to_string(), is_fallback: true }
    }
}

/// Builds revision briefs from analysis records.
#[derive(Debug, Clone, Default)]
pub struct GuidanceBuilder {
    min_gap: f64,
}

impl GuidanceBuilder {
    /// Create a builder that keeps every non-zero gap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave out gaps whose magnitude is at or below `min_gap`.
    pub fn with_min_gap(mut self, min_gap: f64) -> Self {
        self.min_gap = min_gap.max(0.0);
        self
    }

    /// Build the brief for one document.
    ///
    /// Never returns an empty brief: missing material falls back to [`GENERIC_BRIEF`].
    pub fn build(
        &self,
        kind: GuidanceKind,
        record: Option<&AnalysisRecord>,
        custom_text: Option<&str>,
    ) -> RevisionGuidance {
        if kind == GuidanceKind::Custom {
            return match custom_text {
                Some(text) if !text.trim().is_empty() => RevisionGuidance {
                    kind,
                    rendered_brief: text.to_string(),
                    is_fallback: false,
                },
                _ => RevisionGuidance::generic(),
            };
        }

        let Some(record) = record else {
            tracing::debug!(%kind, "No analysis record, using generic brief");
            return RevisionGuidance::generic();
        };

        let checklist = matches!(kind, GuidanceKind::Checklist | GuidanceKind::Both)
            .then(|| self.render_checklist(&record.checklist))
            .flatten();
        let gaps = matches!(kind, GuidanceKind::Gaps | GuidanceKind::Both)
            .then(|| self.render_gaps(&record.dimensions))
            .flatten();

        let sections: Vec<String> = checklist.into_iter().chain(gaps).collect();
        if sections.is_empty() {
            tracing::debug!(%kind, title = %record.title, "Analysis has no material, using generic brief");
            return RevisionGuidance::generic();
        }

        RevisionGuidance { kind, rendered_brief: sections.join("\n\n"), is_fallback: false }
    }

    /// Render flagged checklist items, or `None` if there are none.
    pub fn render_checklist(&self, items: &[ChecklistItem]) -> Option<String> {
        let flagged: Vec<&ChecklistItem> = items.iter().filter(|i| i.flagged).collect();
        if flagged.is_empty() {
            return None;
        }

        let mut out = String::from("## Story-beat checklist");
        for item in flagged {
            let _ = write!(out, "\n\n### {} (priority: {})", item.beat, item.priority);
            if let Some(diagnosis) = item.diagnosis.as_deref().filter(|d| !d.trim().is_empty()) {
                let _ = write!(out, "\nDiagnosis: {}", diagnosis.trim());
            }
            if let Some(rec) = item.recommendation.as_deref().filter(|r| !r.trim().is_empty()) {
                let _ = write!(out, "\nRecommendation: {}", rec.trim());
            }
            for adj in &item.adjustments {
                let verb = match Direction::of(adj.delta) {
                    Direction::Increase => "Increase",
                    Direction::Reduce => "Reduce",
                    Direction::Hold => continue,
                };
                let _ = write!(out, "\n- {} {} by {:.1}", verb, adj.dimension, adj.delta.abs());
            }
        }
        Some(out)
    }

    /// Render the gap table, largest gaps first, or `None` if no gap qualifies.
    pub fn render_gaps(&self, dimensions: &[DimensionScore]) -> Option<String> {
        let mut rows: Vec<&DimensionScore> = dimensions
            .iter()
            .filter(|d| d.gap() != 0.0 && d.gap().abs() > self.min_gap)
            .collect();
        if rows.is_empty() {
            return None;
        }
        rows.sort_by(|a, b| b.gap().abs().total_cmp(&a.gap().abs()));

        let mut out = String::from(
            "## Dimension gaps\n\n| Dimension | Actual | Ideal | Gap | Direction |\n| --- | --- | --- | --- | --- |",
        );
        for d in rows {
            let _ = write!(
                out,
                "\n| {} | {:.1} | {:.1} | {:+.1} | {} |",
                d.name,
                d.actual,
                d.ideal,
                d.gap(),
                d.direction()
            );
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::analysis::{Adjustment, Priority};

    fn record() -> AnalysisRecord {
        AnalysisRecord {
            index: Some(1),
            title: "The Storm".into(),
            text: None,
            dimensions: vec![
                DimensionScore { name: "tension".into(), actual: 3.0, ideal: 6.0 },
                DimensionScore { name: "exposition".into(), actual: 7.0, ideal: 5.5 },
                DimensionScore { name: "humor".into(), actual: 2.0, ideal: 2.0 },
            ],
            checklist: vec![
                ChecklistItem {
                    beat: "Inciting incident".into(),
                    flagged: true,
                    priority: Priority::High,
                    diagnosis: Some("The storm arrives off-page.".into()),
                    recommendation: Some("Dramatize the first gust.".into()),
                    adjustments: vec![
                        Adjustment { dimension: "tension".into(), delta: 2.0 },
                        Adjustment { dimension: "exposition".into(), delta: -1.5 },
                    ],
                },
                ChecklistItem {
                    beat: "Resolution".into(),
                    flagged: false,
                    priority: Priority::Low,
                    diagnosis: None,
                    recommendation: None,
                    adjustments: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_gaps_table() {
        let guidance = GuidanceBuilder::new().build(GuidanceKind::Gaps, Some(&record()), None);
        assert_eq!(
            guidance.rendered_brief,
            "## Dimension gaps\n\n\
             | Dimension | Actual | Ideal | Gap | Direction |\n\
             | --- | --- | --- | --- | --- |\n\
             | tension | 3.0 | 6.0 | +3.0 | increase |\n\
             | exposition | 7.0 | 5.5 | -1.5 | reduce |"
        );
        assert!(!guidance.is_fallback);
    }

    #[test]
    fn test_checklist_only_flagged_items() {
        let guidance = GuidanceBuilder::new().build(GuidanceKind::Checklist, Some(&record()), None);
        assert_eq!(
            guidance.rendered_brief,
            "## Story-beat checklist\n\n\
             ### Inciting incident (priority: high)\n\
             Diagnosis: The storm arrives off-page.\n\
             Recommendation: Dramatize the first gust.\n\
             - Increase tension by 2.0\n\
             - Reduce exposition by 1.5"
        );
    }

    #[test]
    fn test_both_concatenates() {
        let builder = GuidanceBuilder::new();
        let both = builder.build(GuidanceKind::Both, Some(&record()), None);
        let checklist = builder.build(GuidanceKind::Checklist, Some(&record()), None);
        let gaps = builder.build(GuidanceKind::Gaps, Some(&record()), None);

        assert_eq!(both.rendered_brief, format!("{}\n\n{}", checklist.rendered_brief, gaps.rendered_brief));
    }

    #[test]
    fn test_missing_record_falls_back() {
        let guidance = GuidanceBuilder::new().build(GuidanceKind::Gaps, None, None);
        assert_eq!(guidance.rendered_brief, GENERIC_BRIEF);
        assert!(guidance.is_fallback);
    }

    #[test]
    fn test_empty_material_falls_back() {
        let mut empty = record();
        empty.checklist.clear();
        empty.dimensions.truncate(0);

        let guidance = GuidanceBuilder::new().build(GuidanceKind::Both, Some(&empty), None);
        assert_eq!(guidance.rendered_brief, GENERIC_BRIEF);
    }

    #[test]
    fn test_min_gap_filters() {
        let guidance =
            GuidanceBuilder::new().with_min_gap(2.0).build(GuidanceKind::Gaps, Some(&record()), None);
        assert!(guidance.rendered_brief.contains("tension"));
        assert!(!guidance.rendered_brief.contains("exposition"));

        let none = GuidanceBuilder::new().with_min_gap(5.0).build(GuidanceKind::Gaps, Some(&record()), None);
        assert!(none.is_fallback);
    }

    #[test]
    fn test_custom_is_verbatim() {
        let text = "  Cut the flashback.\n";
        let guidance = GuidanceBuilder::new().build(GuidanceKind::Custom, Some(&record()), Some(text));
        assert_eq!(guidance.rendered_brief, text);
        assert_eq!(guidance.kind, GuidanceKind::Custom);

        let blank = GuidanceBuilder::new().build(GuidanceKind::Custom, None, Some("   "));
        assert!(blank.is_fallback);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("GAPS".parse::<GuidanceKind>().unwrap(), GuidanceKind::Gaps);
        assert!("vibes".parse::<GuidanceKind>().is_err());
    }
}

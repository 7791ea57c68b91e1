//! Analysis records produced by the external scoring engine.
//!
//! Records are read-only here. They are matched to documents either by their
//! stored text or by the `<index>-<title>` naming convention.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches `03-the-storm` style names.
static INDEXED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)[-_ ]+(.+)$").expect("valid indexed name pattern"));

/// Score of one narrative dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// Dimension name (e.g. "tension")
    pub name: String,

    /// Measured value
    pub actual: f64,

    /// Target value for this document
    pub ideal: f64,
}

impl DimensionScore {
    /// Signed distance from actual to ideal.
    pub fn gap(&self) -> f64 {
        self.ideal - self.actual
    }

    /// Which way the dimension should move.
    pub fn direction(&self) -> Direction {
        Direction::of(self.gap())
    }
}

/// Direction of a requested change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Reduce,
    Hold,
}

impl Direction {
    /// Direction of a signed delta.
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 {
            Self::Increase
        } else if delta < 0.0 {
            Self::Reduce
        } else {
            Self::Hold
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increase => write!(f, "increase"),
            Self::Reduce => write!(f, "reduce"),
            Self::Hold => write!(f, "hold"),
        }
    }
}

/// Priority of a checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Requested change to one dimension. Positive deltas increase it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub dimension: String,
    pub delta: f64,
}

/// One story-beat checklist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Story beat this item refers to
    pub beat: String,

    /// Only flagged items make it into the brief
    #[serde(default = "default_flagged")]
    pub flagged: bool,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub diagnosis: Option<String>,

    #[serde(default)]
    pub recommendation: Option<String>,

    #[serde(default)]
    pub adjustments: Vec<Adjustment>,
}

fn default_flagged() -> bool {
    true
}

/// Scoring data for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Chapter number; defaults to the 1-based position in the analysis file
    #[serde(default)]
    pub index: Option<usize>,

    /// Title of the scored document
    pub title: String,

    /// Text that was scored
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub dimensions: Vec<DimensionScore>,

    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

/// Lookup over a set of analysis records.
#[derive(Debug, Clone, Default)]
pub struct AnalysisIndex {
    records: Vec<AnalysisRecord>,
}

impl AnalysisIndex {
    /// Create an index, assigning positional numbers to unnumbered records.
    pub fn new(records: Vec<AnalysisRecord>) -> Self {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                record.index.get_or_insert(i + 1);
                record
            })
            .collect();
        Self { records }
    }

    /// An index with no records; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load records from a JSON file holding either an array of records or
    /// an object with a `records` array.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse records from JSON.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum File {
            List(Vec<AnalysisRecord>),
            Wrapped { records: Vec<AnalysisRecord> },
        }

        let records = match serde_json::from_str(content)? {
            File::List(records) | File::Wrapped { records } => records,
        };
        Ok(Self::new(records))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the record for a document.
    ///
    /// First by exact (trimmed) text, then by the `<index>-<title>` name
    /// convention, then by case-insensitive title substring.
    pub fn find(&self, display_name: &str, content: &str) -> Option<&AnalysisRecord> {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            let by_text = self
                .records
                .iter()
                .find(|r| r.text.as_deref().is_some_and(|t| t.trim() == trimmed));
            if by_text.is_some() {
                return by_text;
            }
        }

        let stem = Path::new(display_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_name.to_string());

        let title = match INDEXED_NAME.captures(&stem) {
            Some(caps) => {
                let by_index = caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| self.records.iter().find(|r| r.index == Some(n)));
                if by_index.is_some() {
                    return by_index;
                }
                caps[2].to_string()
            }
            None => stem,
        };

        let needle = normalize_title(&title);
        if needle.is_empty() {
            return None;
        }
        self.records.iter().find(|r| {
            let hay = normalize_title(&r.title);
            hay.contains(&needle)
        })
    }
}

/// Lowercase, with separators folded to single spaces.
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

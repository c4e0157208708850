//! Data models for the topic roll-up.
//!
//! This module contains the typed tables the aggregation consumes
//! (topics, assignments, scored records) and the summary rows and
//! report structures it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical join key for `row_number`.
///
/// Numbers and numeric strings with the same integral value produce the
/// same key, so `1`, `1.0` and `"1"` all join together.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    /// Wraps an already-canonical key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hierarchy level of a topic node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicDepth {
    /// Depth "1" - grouped by the broad label
    Broad,
    /// Depth "2" - grouped by the medium label
    Medium,
    /// Any other depth tag; has no grouping key
    Other(String),
}

impl TopicDepth {
    /// Classifies a normalized depth tag.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "1" => TopicDepth::Broad,
            "2" => TopicDepth::Medium,
            other => TopicDepth::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TopicDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicDepth::Broad => write!(f, "Broad"),
            TopicDepth::Medium => write!(f, "Medium"),
            TopicDepth::Other(tag) => write!(f, "Depth {}", tag),
        }
    }
}

/// A scoring criterion: the score column key and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Column key in the scores table (e.g. "novelty_score").
    pub key: String,
    /// Human-readable label used in reports.
    pub label: String,
}

impl Criterion {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

/// One row of taxonomy metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    /// Normalized depth tag ("1", "2", ...).
    pub depth: String,
    /// Unique topic identifier.
    pub topic_id: String,
    /// Depth-1 grouping label.
    pub broad_label: String,
    /// Depth-2 grouping label.
    pub medium_label: String,
    /// Keyword/description text.
    pub description: String,
}

impl TopicNode {
    pub fn depth_kind(&self) -> TopicDepth {
        TopicDepth::from_tag(&self.depth)
    }
}

/// Topic membership of one scored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub row_number: RowKey,
    pub topic_depth_1: Option<String>,
    pub topic_depth_2: Option<String>,
}

/// One scored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub row_number: RowKey,
    /// Criterion scores, positionally aligned with the configured criteria.
    /// Always finite; bad cells were coerced to 0 at load time.
    pub scores: Vec<f64>,
    pub title: String,
    pub summary: String,
    pub category: String,
}

impl ScoredRecord {
    /// Sum of all criterion scores.
    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// Score for the criterion at `index`, 0 if the record is short.
    pub fn score(&self, index: usize) -> f64 {
        self.scores.get(index).copied().unwrap_or(0.0)
    }
}

/// Per-criterion statistics for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionStats {
    pub key: String,
    pub label: String,
    pub mean_score: f64,
    pub excellent_count: usize,
    pub excellent_ratio: String,
}

/// The highest-scoring record of a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestItem {
    pub title: String,
    pub summary: String,
    pub category: String,
    pub total_score: f64,
    pub scores: Vec<f64>,
}

impl BestItem {
    /// Empty best item with `criteria` zeroed scores.
    pub fn empty(criteria: usize) -> Self {
        Self {
            title: String::new(),
            summary: String::new(),
            category: String::new(),
            total_score: 0.0,
            scores: vec![0.0; criteria],
        }
    }

    pub fn from_record(record: &ScoredRecord) -> Self {
        Self {
            title: record.title.clone(),
            summary: record.summary.clone(),
            category: record.category.clone(),
            total_score: record.total(),
            scores: record.scores.clone(),
        }
    }
}

/// One output row per topic node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub depth: String,
    pub topic_id: String,
    pub broad_label: String,
    pub medium_label: String,
    pub description: String,
    /// Assignment rows carrying this topic's label.
    pub assignment_count: usize,
    /// Scored records in this topic's record set.
    pub item_count: usize,
    pub mean_total_score: f64,
    pub excellent_count: usize,
    pub excellent_ratio: String,
    pub criteria: Vec<CriterionStats>,
    pub best_item: BestItem,
}

impl SummaryRow {
    /// A row with grouping columns copied from `node` and every statistic zeroed.
    pub fn zeroed(node: &TopicNode, criteria: &[Criterion]) -> Self {
        Self {
            depth: node.depth.clone(),
            topic_id: node.topic_id.clone(),
            broad_label: node.broad_label.clone(),
            medium_label: node.medium_label.clone(),
            description: node.description.clone(),
            assignment_count: 0,
            item_count: 0,
            mean_total_score: 0.0,
            excellent_count: 0,
            excellent_ratio: "0%".to_string(),
            criteria: criteria
                .iter()
                .map(|c| CriterionStats {
                    key: c.key.clone(),
                    label: c.label.clone(),
                    mean_score: 0.0,
                    excellent_count: 0,
                    excellent_ratio: "0%".to_string(),
                })
                .collect(),
            best_item: BestItem::empty(criteria.len()),
        }
    }

    /// The label shown for this row: medium label at depth 2, broad otherwise.
    pub fn display_label(&self) -> &str {
        match TopicDepth::from_tag(&self.depth) {
            TopicDepth::Medium => &self.medium_label,
            _ => &self.broad_label,
        }
    }

    /// Excellent ratio as a number (0-100), for sorting.
    pub fn excellent_ratio_value(&self) -> f64 {
        if self.item_count == 0 {
            0.0
        } else {
            self.excellent_count as f64 / self.item_count as f64 * 100.0
        }
    }
}

/// Table sizes and join statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetOverview {
    pub topics: usize,
    pub assignments: usize,
    pub records: usize,
    /// Scored records with a matching assignment.
    pub matched_records: usize,
    /// Scored records no assignment refers to.
    pub unmatched_records: usize,
    /// Score cells coerced to 0 at load time.
    pub coerced_cells: usize,
    /// Topic nodes omitted by the other-depth policy.
    pub dropped_topics: usize,
}

/// Metadata about the summary report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Where the input tables came from.
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    pub criteria: Vec<Criterion>,
    pub total_threshold: f64,
    pub criterion_threshold: f64,
    /// Duration of loading and aggregation in seconds.
    pub duration_seconds: f64,
}

/// The complete topic summary report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub overview: DatasetOverview,
    pub rows: Vec<SummaryRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(depth: &str) -> TopicNode {
        TopicNode {
            depth: depth.to_string(),
            topic_id: "T1".to_string(),
            broad_label: "Health".to_string(),
            medium_label: "Fitness".to_string(),
            description: "kw".to_string(),
        }
    }

    #[test]
    fn test_depth_from_tag() {
        assert_eq!(TopicDepth::from_tag("1"), TopicDepth::Broad);
        assert_eq!(TopicDepth::from_tag("2"), TopicDepth::Medium);
        assert_eq!(
            TopicDepth::from_tag("3"),
            TopicDepth::Other("3".to_string())
        );
    }

    #[test]
    fn test_depth_kind() {
        assert_eq!(node("1").depth_kind(), TopicDepth::Broad);
        assert_eq!(node("2").depth_kind(), TopicDepth::Medium);
        assert_eq!(node("3").depth_kind().to_string(), "Depth 3");
    }

    #[test]
    fn test_record_total() {
        let record = ScoredRecord {
            row_number: RowKey::new("1"),
            scores: vec![5.0, 4.0, 3.5],
            title: String::new(),
            summary: String::new(),
            category: String::new(),
        };
        assert_eq!(record.total(), 12.5);
        assert_eq!(record.score(1), 4.0);
        assert_eq!(record.score(7), 0.0);
    }

    #[test]
    fn test_zeroed_row() {
        let criteria = vec![Criterion::new("a", "A"), Criterion::new("b", "B")];
        let row = SummaryRow::zeroed(&node("2"), &criteria);

        assert_eq!(row.item_count, 0);
        assert_eq!(row.excellent_ratio, "0%");
        assert_eq!(row.criteria.len(), 2);
        assert_eq!(row.best_item.scores, vec![0.0, 0.0]);
        assert_eq!(row.display_label(), "Fitness");
        assert_eq!(row.excellent_ratio_value(), 0.0);
    }
}

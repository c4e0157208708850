//! Topic aggregation and statistics.
//!
//! This module rolls the scored records up into one summary row per
//! topic node: item counts, rounded means, excellent counts and ratios
//! at the configured thresholds, and the best item of each topic.

use crate::config::Config;
use crate::models::{
    BestItem, Criterion, CriterionStats, DatasetOverview, RowKey, ScoredRecord, SummaryRow,
    TopicAssignment, TopicDepth, TopicNode,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Handling of topic nodes whose depth is neither "1" nor "2".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OtherDepthPolicy {
    /// Keep the row with grouping columns filled and statistics zeroed.
    #[default]
    ZeroFill,
    /// Leave the row out of the result.
    Drop,
}

/// Parameters of one aggregation run.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Criteria in output order; record scores are aligned with this list.
    pub criteria: Vec<Criterion>,
    /// Minimum combined score for an excellent item.
    pub total_threshold: f64,
    /// Minimum single-criterion score for an excellent item.
    pub criterion_threshold: f64,
    pub other_depths: OtherDepthPolicy,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AggregationSettings {
    fn from(config: &Config) -> Self {
        Self {
            criteria: config.criteria.clone(),
            total_threshold: config.thresholds.total,
            criterion_threshold: config.thresholds.criterion,
            other_depths: config.aggregation.other_depths,
        }
    }
}

/// Row keys and assignment counts per label, for one depth.
#[derive(Default)]
struct LabelIndex<'a> {
    members: HashMap<&'a str, HashSet<&'a RowKey>>,
    assignments: HashMap<&'a str, usize>,
}

impl<'a> LabelIndex<'a> {
    fn insert(&mut self, label: &'a str, row: &'a RowKey) {
        self.members.entry(label).or_default().insert(row);
        *self.assignments.entry(label).or_default() += 1;
    }
}

/// Build one summary row per topic node.
///
/// Each topic's record set is the scored records whose row number is
/// assigned the topic's label, in input order. Inputs are not modified.
pub fn aggregate(
    topics: &[TopicNode],
    assignments: &[TopicAssignment],
    records: &[ScoredRecord],
    settings: &AggregationSettings,
) -> Vec<SummaryRow> {
    let mut broad = LabelIndex::default();
    let mut medium = LabelIndex::default();

    for assignment in assignments {
        // An empty label is a missing label and joins nothing.
        if let Some(label) = assignment.topic_depth_1.as_deref().filter(|l| !l.is_empty()) {
            broad.insert(label, &assignment.row_number);
        }
        if let Some(label) = assignment.topic_depth_2.as_deref().filter(|l| !l.is_empty()) {
            medium.insert(label, &assignment.row_number);
        }
    }

    topics
        .iter()
        .filter_map(|node| {
            let (index, label) = match node.depth_kind() {
                TopicDepth::Broad => (&broad, node.broad_label.as_str()),
                TopicDepth::Medium => (&medium, node.medium_label.as_str()),
                TopicDepth::Other(_) => {
                    return match settings.other_depths {
                        OtherDepthPolicy::ZeroFill => {
                            Some(SummaryRow::zeroed(node, &settings.criteria))
                        }
                        OtherDepthPolicy::Drop => None,
                    };
                }
            };

            let group: Vec<&ScoredRecord> = match index.members.get(label) {
                Some(members) => records
                    .iter()
                    .filter(|r| members.contains(&r.row_number))
                    .collect(),
                None => Vec::new(),
            };

            let mut row = summarize(node, &group, settings);
            row.assignment_count = index.assignments.get(label).copied().unwrap_or(0);
            Some(row)
        })
        .collect()
}

/// Compute the statistics of one topic over its record set.
fn summarize(
    node: &TopicNode,
    group: &[&ScoredRecord],
    settings: &AggregationSettings,
) -> SummaryRow {
    let mut row = SummaryRow::zeroed(node, &settings.criteria);
    if group.is_empty() {
        return row;
    }

    let n = group.len();
    let totals: Vec<f64> = group.iter().map(|r| r.total()).collect();

    row.item_count = n;
    row.mean_total_score = round_to(mean(&totals), 2);
    row.excellent_count = totals
        .iter()
        .filter(|&&t| t >= settings.total_threshold)
        .count();
    row.excellent_ratio = format_ratio(row.excellent_count, row.item_count);

    for (i, stats) in row.criteria.iter_mut().enumerate() {
        let values: Vec<f64> = group.iter().map(|r| r.score(i)).collect();
        let excellent = values
            .iter()
            .filter(|&&v| v >= settings.criterion_threshold)
            .count();

        stats.mean_score = round_to(mean(&values), 2);
        stats.excellent_count = excellent;
        stats.excellent_ratio = format_ratio(excellent, values.len());
    }

    if let Some(best) = best_record(group) {
        row.best_item = BestItem::from_record(best);
    }

    row
}

/// The record with the highest combined score; the first one wins ties.
pub fn best_record<'a>(group: &[&'a ScoredRecord]) -> Option<&'a ScoredRecord> {
    group.iter().copied().fold(None, |best, record| match best {
        Some(b) if b.total() >= record.total() => Some(b),
        _ => Some(record),
    })
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Round to `places` decimals, exact halves to even.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round_ties_even() / factor
}

/// Format `count / total` as a percentage with one decimal, "0%" when total is 0.
pub fn format_ratio(count: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    let ratio = count as f64 / total as f64 * 100.0;
    format!("{:.1}%", round_to(ratio, 1))
}

/// Table sizes and how many scored records any assignment refers to.
pub fn overview(
    topics: &[TopicNode],
    assignments: &[TopicAssignment],
    records: &[ScoredRecord],
    rows: &[SummaryRow],
) -> DatasetOverview {
    let assigned: HashSet<&RowKey> = assignments.iter().map(|a| &a.row_number).collect();
    let matched = records
        .iter()
        .filter(|r| assigned.contains(&r.row_number))
        .count();

    DatasetOverview {
        topics: topics.len(),
        assignments: assignments.len(),
        records: records.len(),
        matched_records: matched,
        unmatched_records: records.len() - matched,
        coerced_cells: 0,
        dropped_topics: topics.len().saturating_sub(rows.len()),
    }
}

/// Topics with items, ordered by excellent ratio, then mean total score.
pub fn top_topics_by_ratio(rows: &[SummaryRow], n: usize) -> Vec<&SummaryRow> {
    let mut ranked: Vec<&SummaryRow> = rows.iter().filter(|r| r.item_count > 0).collect();

    ranked.sort_by(|a, b| {
        b.excellent_ratio_value()
            .total_cmp(&a.excellent_ratio_value())
            .then_with(|| b.mean_total_score.total_cmp(&a.mean_total_score))
    });
    ranked.truncate(n);

    ranked
}

/// Count summary rows per depth tag.
pub fn depth_distribution(rows: &[SummaryRow]) -> HashMap<String, usize> {
    let mut dist: HashMap<String, usize> = HashMap::new();

    for row in rows {
        *dist.entry(row.depth.clone()).or_default() += 1;
    }

    dist
}

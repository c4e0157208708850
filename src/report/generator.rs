//! Report generation.
//!
//! This module renders the summary rows as a Markdown report, a JSON
//! document, or a CSV table ready for spreadsheet import.

use crate::analysis::{depth_distribution, top_topics_by_ratio};
use crate::config::ReportConfig;
use crate::models::{DatasetOverview, Report, ReportMetadata, SummaryRow, TopicDepth};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Topic Summary Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_overview_section(&report.overview, &report.rows));
    output.push_str(&generate_top_topics_section(
        &report.rows,
        options.top_topics,
    ));
    output.push_str(&generate_topics_section(report, options));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    let criteria: Vec<String> = metadata
        .criteria
        .iter()
        .map(|c| format!("{} (`{}`)", c.label, c.key))
        .collect();
    section.push_str(&format!("- **Criteria:** {}\n", criteria.join(", ")));
    section.push_str(&format!(
        "- **Excellent Thresholds:** total >= {}, per criterion >= {}\n",
        metadata.total_threshold, metadata.criterion_threshold
    ));
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Overview](#overview)\n");
    toc.push_str("- [Top Topics](#top-topics)\n");

    for (title, anchor, _) in depth_groups(&report.rows) {
        toc.push_str(&format!("- [{}](#{})\n", title, anchor));
    }

    toc.push('\n');

    toc
}

/// Generate the overview section.
fn generate_overview_section(overview: &DatasetOverview, rows: &[SummaryRow]) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str("| Topics | Assignments | Records | Matched | Unmatched |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        overview.topics,
        overview.assignments,
        overview.records,
        overview.matched_records,
        overview.unmatched_records
    ));

    if overview.coerced_cells > 0 {
        section.push_str(&format!(
            "> {} score cells were missing or non-numeric and counted as 0.\n\n",
            overview.coerced_cells
        ));
    }
    if overview.dropped_topics > 0 {
        section.push_str(&format!(
            "> {} topics with an unsupported depth were left out.\n\n",
            overview.dropped_topics
        ));
    }

    let dist = depth_distribution(rows);
    if !dist.is_empty() {
        section.push_str("### Topics by Depth\n\n");
        section.push_str("| Depth | Topics |\n");
        section.push_str("|:---|:---:|\n");

        let mut depths: Vec<_> = dist.iter().collect();
        depths.sort();

        for (depth, count) in depths {
            section.push_str(&format!(
                "| {} ({}) | {} |\n",
                depth,
                TopicDepth::from_tag(depth),
                count
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the top topics section.
fn generate_top_topics_section(rows: &[SummaryRow], n: usize) -> String {
    let mut section = String::new();

    section.push_str("## Top Topics\n\n");

    let top = top_topics_by_ratio(rows, n);
    if top.is_empty() {
        section.push_str("No topic has any scored records.\n\n");
        return section;
    }

    section.push_str("| Topic | Depth | Items | Mean Score | Excellent | Ratio |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");

    for row in top {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            escape_markdown(row.display_label()),
            row.depth,
            row.item_count,
            row.mean_total_score,
            row.excellent_count,
            row.excellent_ratio
        ));
    }
    section.push('\n');

    section
}

/// Split rows into broad, medium and other groups: (title, anchor, rows).
fn depth_groups(rows: &[SummaryRow]) -> Vec<(&'static str, &'static str, Vec<&SummaryRow>)> {
    let mut broad = Vec::new();
    let mut medium = Vec::new();
    let mut other = Vec::new();

    for row in rows {
        match TopicDepth::from_tag(&row.depth) {
            TopicDepth::Broad => broad.push(row),
            TopicDepth::Medium => medium.push(row),
            TopicDepth::Other(_) => other.push(row),
        }
    }

    [
        ("Broad Topics", "broad-topics", broad),
        ("Medium Topics", "medium-topics", medium),
        ("Other Topics", "other-topics", other),
    ]
    .into_iter()
    .filter(|(_, _, rows)| !rows.is_empty())
    .collect()
}

/// Generate one table per depth group.
fn generate_topics_section(report: &Report, options: &ReportConfig) -> String {
    let mut section = String::new();

    for (title, _, rows) in depth_groups(&report.rows) {
        section.push_str(&format!("## {}\n\n", title));

        let rows: Vec<_> = rows
            .into_iter()
            .filter(|r| options.include_empty_topics || r.item_count > 0)
            .collect();

        if rows.is_empty() {
            section.push_str("No topics with scored records.\n\n");
            continue;
        }

        section.push_str(&generate_topic_table(&rows, report, options));
    }

    section
}

/// Generate a Markdown table of summary rows.
fn generate_topic_table(rows: &[&SummaryRow], report: &Report, options: &ReportConfig) -> String {
    let mut table = String::new();

    let mut header = vec![
        "Topic ID".to_string(),
        "Topic".to_string(),
        "Keywords".to_string(),
        "Items".to_string(),
        "Assigned".to_string(),
        "Mean Score".to_string(),
        "Excellent".to_string(),
        "Ratio".to_string(),
    ];
    for criterion in &report.metadata.criteria {
        header.push(format!("{} Mean", criterion.label));
        header.push(format!("{} Ratio", criterion.label));
    }
    if options.include_best_items {
        header.push("Best Item".to_string());
        header.push("Best Total".to_string());
    }

    table.push_str(&format!("| {} |\n", header.join(" | ")));
    table.push_str(&format!("|{}\n", ":---|".repeat(header.len())));

    for row in rows {
        let mut cells = vec![
            escape_markdown(&row.topic_id),
            escape_markdown(row.display_label()),
            escape_markdown(&row.description),
            row.item_count.to_string(),
            row.assignment_count.to_string(),
            row.mean_total_score.to_string(),
            row.excellent_count.to_string(),
            row.excellent_ratio.clone(),
        ];
        for stats in &row.criteria {
            cells.push(stats.mean_score.to_string());
            cells.push(stats.excellent_ratio.clone());
        }
        if options.include_best_items {
            cells.push(escape_markdown(&row.best_item.title));
            cells.push(row.best_item.total_score.to_string());
        }

        table.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    table.push('\n');

    table
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by TopicRoll v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Column headers of the CSV table, in spreadsheet order.
fn csv_header(metadata: &ReportMetadata) -> Vec<String> {
    let total = metadata.total_threshold;
    let each = metadata.criterion_threshold;

    let mut header: Vec<String> = [
        "Depth",
        "Topic ID",
        "Broad Topic",
        "Medium Topic",
        "Keywords",
        "Item Count",
        "Mean Score",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for c in &metadata.criteria {
        header.push(format!("{} Average", c.label));
    }
    header.push(format!("Excellent Items (>= {})", total));
    header.push(format!("Excellent Ratio (>= {})", total));

    for c in &metadata.criteria {
        header.push(format!("{} Mean Score", c.label));
        header.push(format!("{} Excellent Items (>= {})", c.label, each));
        header.push(format!("{} Excellent Ratio (>= {})", c.label, each));
    }

    for name in ["Best Item", "Summary", "Category", "Total Score"] {
        header.push(name.to_string());
    }
    for c in &metadata.criteria {
        header.push(format!("{} Score", c.label));
    }

    header
}

/// Cells of one CSV row, aligned with `csv_header`.
fn csv_cells(row: &SummaryRow) -> Vec<String> {
    let mut cells = vec![
        row.depth.clone(),
        row.topic_id.clone(),
        row.broad_label.clone(),
        row.medium_label.clone(),
        row.description.clone(),
        row.item_count.to_string(),
        row.mean_total_score.to_string(),
    ];

    for stats in &row.criteria {
        cells.push(stats.mean_score.to_string());
    }
    cells.push(row.excellent_count.to_string());
    cells.push(row.excellent_ratio.clone());

    for stats in &row.criteria {
        cells.push(stats.mean_score.to_string());
        cells.push(stats.excellent_count.to_string());
        cells.push(stats.excellent_ratio.clone());
    }

    cells.push(row.best_item.title.clone());
    cells.push(row.best_item.summary.clone());
    cells.push(row.best_item.category.clone());
    cells.push(row.best_item.total_score.to_string());
    for score in &row.best_item.scores {
        cells.push(score.to_string());
    }

    cells
}

/// Generate the CSV table. An empty report still yields the header row.
pub fn generate_csv_table(report: &Report) -> String {
    let mut output = String::new();

    push_csv_line(&mut output, &csv_header(&report.metadata));
    for row in &report.rows {
        push_csv_line(&mut output, &csv_cells(row));
    }

    output
}

fn push_csv_line(output: &mut String, cells: &[String]) {
    let line: Vec<String> = cells.iter().map(|c| escape_csv(c)).collect();
    output.push_str(&line.join(","));
    output.push('\n');
}

/// Quote a CSV cell if it holds a comma, quote or line break.
fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, overview, AggregationSettings};
    use crate::models::{RowKey, ScoredRecord, TopicAssignment, TopicNode};
    use chrono::Utc;

    fn create_test_report() -> Report {
        let settings = AggregationSettings::default();
        let topics = vec![
            TopicNode {
                depth: "1".to_string(),
                topic_id: "T1".to_string(),
                broad_label: "Health".to_string(),
                medium_label: String::new(),
                description: "fitness, diet".to_string(),
            },
            TopicNode {
                depth: "2".to_string(),
                topic_id: "T1a".to_string(),
                broad_label: "Health".to_string(),
                medium_label: "Sleep | Rest".to_string(),
                description: "sleep".to_string(),
            },
        ];
        let assignments = vec![TopicAssignment {
            row_number: RowKey::new("1"),
            topic_depth_1: Some("Health".to_string()),
            topic_depth_2: Some("Fitness".to_string()),
        }];
        let records = vec![ScoredRecord {
            row_number: RowKey::new("1"),
            scores: vec![5.0, 4.0, 4.0],
            title: "Step \"Counter\"".to_string(),
            summary: "Counts steps, daily".to_string(),
            category: "Wearables".to_string(),
        }];

        let rows = aggregate(&topics, &assignments, &records, &settings);
        let overview = overview(&topics, &assignments, &records, &rows);

        Report {
            metadata: ReportMetadata {
                source: "sample.json".to_string(),
                generated_at: Utc::now(),
                criteria: settings.criteria.clone(),
                total_threshold: settings.total_threshold,
                criterion_threshold: settings.criterion_threshold,
                duration_seconds: 0.01,
            },
            overview,
            rows,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report, &ReportConfig::default());

        assert!(markdown.contains("# Topic Summary Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Overview"));
        assert!(markdown.contains("## Top Topics"));
        assert!(markdown.contains("## Broad Topics"));
        assert!(markdown.contains("## Medium Topics"));
        assert!(!markdown.contains("## Other Topics"));
        assert!(markdown.contains("Health"));
        assert!(markdown.contains("100.0%"));
        assert!(markdown.contains("Sleep \\| Rest"));
    }

    #[test]
    fn test_markdown_hides_empty_topics() {
        let report = create_test_report();
        let options = ReportConfig {
            include_empty_topics: false,
            include_best_items: false,
            ..ReportConfig::default()
        };

        let markdown = generate_markdown_report(&report, &options);

        assert!(markdown.contains("No topics with scored records."));
        assert!(!markdown.contains("Best Item"));
    }

    #[test]
    fn test_generate_metadata_section() {
        let report = create_test_report();
        let section = generate_metadata_section(&report.metadata);

        assert!(section.contains("sample.json"));
        assert!(section.contains("Novelty (`novelty_score`)"));
        assert!(section.contains("total >= 12, per criterion >= 4"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"rows\""));
        assert!(json.contains("\"excellent_ratio\""));
        assert!(json.contains("\"best_item\""));
    }

    #[test]
    fn test_csv_header_order() {
        let report = create_test_report();
        let header = csv_header(&report.metadata);

        assert_eq!(header[0], "Depth");
        assert_eq!(header[7], "Novelty Average");
        assert_eq!(header[10], "Excellent Items (>= 12)");
        assert_eq!(header[12], "Novelty Mean Score");
        assert_eq!(header[13], "Novelty Excellent Items (>= 4)");
        assert_eq!(header.last().map(String::as_str), Some("Marketability Score"));
        assert_eq!(header.len(), 28);
    }

    #[test]
    fn test_generate_csv_table() {
        let report = create_test_report();
        let csv = generate_csv_table(&report);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,T1,Health,,\"fitness, diet\",1,13,"));
        assert!(lines[1].contains("\"Step \"\"Counter\"\"\""));
        assert!(lines[1].contains("\"Counts steps, daily\""));
        assert!(lines[2].starts_with("2,T1a,Health,Sleep | Rest,sleep,0,0,"));

        for line in &lines[1..] {
            assert_eq!(csv_cells_count(line), csv_header(&report.metadata).len());
        }
    }

    #[test]
    fn test_csv_for_empty_report_is_header_only() {
        let mut report = create_test_report();
        report.rows.clear();

        let csv = generate_csv_table(&report);
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("Depth,Topic ID,"));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    // Count cells in a CSV line produced by `escape_csv`.
    fn csv_cells_count(line: &str) -> usize {
        let mut count = 1;
        let mut quoted = false;
        for ch in line.chars() {
            match ch {
                '"' => quoted = !quoted,
                ',' if !quoted => count += 1,
                _ => {}
            }
        }
        count
    }
}

//! Input table loading.
//!
//! This module reads the topic, assignment and score tables from JSON
//! files and turns them into typed records, validating the schema at
//! the boundary so the aggregation never sees malformed rows.

pub mod schema;

use crate::cli::InputSource;
use crate::config::ColumnsConfig;
use crate::models::{Criterion, RowKey, ScoredRecord, TopicAssignment, TopicDepth, TopicNode};
use anyhow::{Context, Result};
use schema::{SchemaError, Table};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// The three typed input tables of one run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub topics: Vec<TopicNode>,
    pub assignments: Vec<TopicAssignment>,
    pub records: Vec<ScoredRecord>,
    /// Score cells that were missing or non-numeric and read as 0.
    pub coerced_cells: usize,
}

/// Reads raw JSON tables using the configured column names.
pub struct TableReader<'a> {
    columns: &'a ColumnsConfig,
    criteria: &'a [Criterion],
}

impl<'a> TableReader<'a> {
    /// Create a new table reader.
    pub fn new(columns: &'a ColumnsConfig, criteria: &'a [Criterion]) -> Self {
        Self { columns, criteria }
    }

    /// Read a bundle object holding all three tables.
    pub fn read_bundle(&self, bundle: &Value) -> Result<Dataset, SchemaError> {
        let table = |t: Table| bundle.get(t.key()).ok_or(SchemaError::MissingTable(t));

        self.read_tables(
            table(Table::Topics)?,
            table(Table::Assignments)?,
            table(Table::Scores)?,
        )
    }

    /// Read and cross-check the three tables.
    pub fn read_tables(
        &self,
        topics: &Value,
        assignments: &Value,
        scores: &Value,
    ) -> Result<Dataset, SchemaError> {
        let topics = self.read_topics(topics)?;
        let assignments = self.read_assignments(assignments, &topics)?;
        let (records, coerced_cells) = self.read_scores(scores)?;

        Ok(Dataset {
            topics,
            assignments,
            records,
            coerced_cells,
        })
    }

    /// Read the topic taxonomy table.
    pub fn read_topics(&self, value: &Value) -> Result<Vec<TopicNode>, SchemaError> {
        let table = Table::Topics;
        let cols = self.columns;
        let rows = schema::rows(table, value)?;

        let mut seen = HashSet::new();
        let mut topics = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            let depth = schema::key_cell(table, row, index, &cols.topic_depth)?;
            let topic_id = schema::required_text(table, row, index, &cols.topic_id)?;

            let broad_label = schema::text_cell(row, &cols.topic_broad);
            let medium_label = schema::text_cell(row, &cols.topic_medium);

            // A node without the label it groups by matches nothing.
            let grouping = match TopicDepth::from_tag(&depth) {
                TopicDepth::Broad => Some((&cols.topic_broad, &broad_label)),
                TopicDepth::Medium => Some((&cols.topic_medium, &medium_label)),
                TopicDepth::Other(_) => None,
            };
            if let Some((column, label)) = grouping {
                if label.is_empty() {
                    warn!(
                        "Topic '{}' has no '{}' label; its row will be zeroed",
                        topic_id, column
                    );
                }
            }

            if !seen.insert(topic_id.clone()) {
                return Err(SchemaError::DuplicateKey {
                    table,
                    field: cols.topic_id.clone(),
                    value: topic_id,
                });
            }

            topics.push(TopicNode {
                depth,
                topic_id,
                broad_label,
                medium_label,
                description: schema::text_cell(row, &cols.topic_description),
            });
        }

        debug!("Read {} topic nodes", topics.len());
        Ok(topics)
    }

    /// Read the assignment table.
    ///
    /// The label columns are only required when some topic groups by them.
    pub fn read_assignments(
        &self,
        value: &Value,
        topics: &[TopicNode],
    ) -> Result<Vec<TopicAssignment>, SchemaError> {
        let table = Table::Assignments;
        let cols = self.columns;
        let rows = schema::rows(table, value)?;

        let depths: HashSet<TopicDepth> = topics.iter().map(TopicNode::depth_kind).collect();
        if depths.contains(&TopicDepth::Broad) {
            schema::require_column(table, &rows, &cols.assignment_broad)?;
        }
        if depths.contains(&TopicDepth::Medium) {
            schema::require_column(table, &rows, &cols.assignment_medium)?;
        }

        let assignments = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| -> Result<TopicAssignment, SchemaError> {
                let key = schema::key_cell(table, row, index, &cols.row_number)?;
                Ok(TopicAssignment {
                    row_number: RowKey::new(key),
                    topic_depth_1: schema::optional_text(row, &cols.assignment_broad),
                    topic_depth_2: schema::optional_text(row, &cols.assignment_medium),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Read {} topic assignments", assignments.len());
        Ok(assignments)
    }

    /// Read the scored record table.
    ///
    /// Returns the records and the number of score cells coerced to 0.
    pub fn read_scores(&self, value: &Value) -> Result<(Vec<ScoredRecord>, usize), SchemaError> {
        let table = Table::Scores;
        let cols = self.columns;
        let rows = schema::rows(table, value)?;

        // Only a table with none of the criterion columns is the wrong schema;
        // a single absent criterion reads as 0 like any other missing cell.
        let absent: Vec<&str> = self
            .criteria
            .iter()
            .filter(|c| !schema::has_column(&rows, &c.key))
            .map(|c| c.key.as_str())
            .collect();
        if !rows.is_empty() && absent.len() == self.criteria.len() {
            if let Some(first) = self.criteria.first() {
                return Err(SchemaError::MissingColumn {
                    table,
                    column: first.key.clone(),
                });
            }
        }
        if !rows.is_empty() {
            for column in &absent {
                warn!("Scores table has no '{}' column; reading it as 0", column);
            }
        }

        let mut coerced = 0;
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        let mut records = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            let row_number = RowKey::new(schema::key_cell(table, row, index, &cols.row_number)?);

            let scores: Vec<f64> = self
                .criteria
                .iter()
                .map(|c| {
                    schema::score_cell(row, &c.key).unwrap_or_else(|| {
                        coerced += 1;
                        0.0
                    })
                })
                .collect();

            if !seen.insert(row_number.clone()) {
                duplicates += 1;
            }

            records.push(ScoredRecord {
                row_number,
                scores,
                title: schema::text_cell(row, &cols.title),
                summary: schema::text_cell(row, &cols.summary),
                category: schema::text_cell(row, &cols.category),
            });
        }

        if coerced > 0 {
            warn!("{} score cells were missing or non-numeric and read as 0", coerced);
        }
        if duplicates > 0 {
            warn!("{} scored records repeat an earlier row number", duplicates);
        }
        debug!("Read {} scored records", records.len());

        Ok((records, coerced))
    }
}

/// Load the input tables from disk.
pub fn load_dataset(source: &InputSource, reader: &TableReader<'_>) -> Result<Dataset> {
    match source {
        InputSource::Bundle(path) => {
            let bundle = read_json(path)?;
            reader
                .read_bundle(&bundle)
                .with_context(|| format!("Schema mismatch in {}", path.display()))
        }
        InputSource::Tables {
            topics,
            assignments,
            scores,
        } => {
            let topics_value = read_json(topics)?;
            let assignments_value = read_json(assignments)?;
            let scores_value = read_json(scores)?;

            reader
                .read_tables(&topics_value, &assignments_value, &scores_value)
                .context("Schema mismatch in input tables")
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))
}

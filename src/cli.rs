//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TopicRoll - per-topic summary tables from scored records
///
/// Joins a topic taxonomy, topic assignments and multi-criteria scores,
/// then writes one summary row per topic (counts, means, excellent
/// ratios and the best item) as Markdown, JSON or CSV.
///
/// Examples:
///   topicroll --dataset export.json
///   topicroll --topics topics.json --assignments assign.json --scores scores.json
///   topicroll --dataset export.json --format csv -o summary.csv
///   topicroll --dataset export.json --validate-only
///   topicroll --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Bundle file holding the topics, assignments and scores tables
    ///
    /// A JSON object with "topics", "assignments" and "scores" arrays.
    #[arg(short, long, value_name = "FILE")]
    pub dataset: Option<PathBuf>,

    /// Topic taxonomy table (JSON array of objects)
    #[arg(long, value_name = "FILE")]
    pub topics: Option<PathBuf>,

    /// Topic assignment table (JSON array of objects)
    #[arg(long, value_name = "FILE")]
    pub assignments: Option<PathBuf>,

    /// Scored record table (JSON array of objects)
    #[arg(long, value_name = "FILE")]
    pub scores: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to the config file setting (topic_summary.md).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, value_name = "FORMAT", env = "TOPICROLL_FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .topicroll.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Minimum combined score for an excellent item
    #[arg(long, value_name = "SCORE")]
    pub total_threshold: Option<f64>,

    /// Minimum single-criterion score for an excellent item
    #[arg(long, value_name = "SCORE")]
    pub criterion_threshold: Option<f64>,

    /// Omit topics whose depth is neither 1 nor 2
    ///
    /// By default such topics are kept with zeroed statistics.
    #[arg(long)]
    pub drop_other_depths: bool,

    /// Fail if any scored record has no topic assignment
    ///
    /// Useful for CI pipelines. Exit code 2 when unmatched records exist.
    #[arg(long)]
    pub fail_on_unmatched: bool,

    /// Load and validate the input tables, then exit without a report
    #[arg(long)]
    pub validate_only: bool,

    /// Generate a default .topicroll.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV table for spreadsheet import
    Csv,
}

/// Where the input tables come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// One bundle file with all three tables.
    Bundle(PathBuf),
    /// One file per table.
    Tables {
        topics: PathBuf,
        assignments: PathBuf,
        scores: PathBuf,
    },
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let tables = [&self.topics, &self.assignments, &self.scores];
        let given = tables.iter().filter(|t| t.is_some()).count();

        if self.dataset.is_some() && given > 0 {
            return Err(
                "Use either --dataset or --topics/--assignments/--scores, not both".to_string(),
            );
        }
        if self.dataset.is_none() && given == 0 {
            return Err(
                "No input given: pass --dataset or --topics, --assignments and --scores"
                    .to_string(),
            );
        }
        if self.dataset.is_none() && given < 3 {
            return Err("--topics, --assignments and --scores must be given together".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for (name, value) in [
            ("--total-threshold", self.total_threshold),
            ("--criterion-threshold", self.criterion_threshold),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{} must be a non-negative number", name));
                }
            }
        }

        let inputs = [&self.dataset, &self.topics, &self.assignments, &self.scores];
        for path in inputs.into_iter().flatten() {
            if !path.is_file() {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the input source. Call after `validate`.
    pub fn input_source(&self) -> Option<InputSource> {
        if let Some(ref bundle) = self.dataset {
            return Some(InputSource::Bundle(bundle.clone()));
        }

        match (&self.topics, &self.assignments, &self.scores) {
            (Some(topics), Some(assignments), Some(scores)) => Some(InputSource::Tables {
                topics: topics.clone(),
                assignments: assignments.clone(),
                scores: scores.clone(),
            }),
            _ => None,
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            dataset: None,
            topics: None,
            assignments: None,
            scores: None,
            output: None,
            format: None,
            config: None,
            verbose: false,
            quiet: false,
            total_threshold: None,
            criterion_threshold: None,
            drop_other_depths: false,
            fail_on_unmatched: false,
            validate_only: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_requires_input() {
        let args = make_args();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_init_config_needs_nothing() {
        let mut args = make_args();
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_partial_tables() {
        let mut args = make_args();
        args.topics = Some(PathBuf::from("topics.json"));
        let err = args.validate().unwrap_err();
        assert!(err.contains("together"));
    }

    #[test]
    fn test_validation_bundle_and_tables() {
        let mut args = make_args();
        args.dataset = Some(PathBuf::from("bundle.json"));
        args.scores = Some(PathBuf::from("scores.json"));
        let err = args.validate().unwrap_err();
        assert!(err.contains("not both"));
    }

    #[test]
    fn test_validation_missing_file() {
        let mut args = make_args();
        args.dataset = Some(PathBuf::from("/nonexistent/bundle.json"));
        let err = args.validate().unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn test_validation_existing_bundle() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut args = make_args();
        args.dataset = Some(file.path().to_path_buf());
        assert!(args.validate().is_ok());
        assert_eq!(
            args.input_source(),
            Some(InputSource::Bundle(file.path().to_path_buf()))
        );
    }

    #[test]
    fn test_validation_bad_threshold() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut args = make_args();
        args.dataset = Some(file.path().to_path_buf());
        args.total_threshold = Some(-2.0);
        assert!(args.validate().is_err());

        args.total_threshold = Some(f64::NAN);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut args = make_args();
        args.dataset = Some(file.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_input_source_tables() {
        let mut args = make_args();
        args.topics = Some(PathBuf::from("t.json"));
        args.assignments = Some(PathBuf::from("a.json"));
        args.scores = Some(PathBuf::from("s.json"));

        assert_eq!(
            args.input_source(),
            Some(InputSource::Tables {
                topics: PathBuf::from("t.json"),
                assignments: PathBuf::from("a.json"),
                scores: PathBuf::from("s.json"),
            })
        );
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

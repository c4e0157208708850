//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.topicroll.toml` files.

use crate::analysis::OtherDepthPolicy;
use crate::cli::OutputFormat;
use crate::models::Criterion;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".topicroll.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Column names in the input tables.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Thresholds for "excellent" items.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Aggregation policy settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Scoring criteria, in output order.
    #[serde(default = "default_criteria")]
    pub criteria: Vec<Criterion>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            columns: ColumnsConfig::default(),
            thresholds: ThresholdsConfig::default(),
            aggregation: AggregationConfig::default(),
            report: ReportConfig::default(),
            criteria: default_criteria(),
        }
    }
}

fn default_criteria() -> Vec<Criterion> {
    vec![
        Criterion::new("novelty_score", "Novelty"),
        Criterion::new("feasibility_score", "Feasibility"),
        Criterion::new("marketability_score", "Marketability"),
    ]
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "topic_summary.md".to_string()
}

/// Column names used to read the input tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Topic table: hierarchy depth.
    #[serde(default = "default_depth")]
    pub topic_depth: String,

    /// Topic table: topic identifier.
    #[serde(default = "default_topic_id")]
    pub topic_id: String,

    /// Topic table: depth-1 label.
    #[serde(default = "default_depth_1")]
    pub topic_broad: String,

    /// Topic table: depth-2 label.
    #[serde(default = "default_depth_2")]
    pub topic_medium: String,

    /// Topic table: keyword description.
    #[serde(default = "default_description")]
    pub topic_description: String,

    /// Assignment and score tables: join key.
    #[serde(default = "default_row_number")]
    pub row_number: String,

    /// Assignment table: depth-1 label.
    #[serde(default = "default_depth_1")]
    pub assignment_broad: String,

    /// Assignment table: depth-2 label.
    #[serde(default = "default_depth_2")]
    pub assignment_medium: String,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_summary")]
    pub summary: String,

    #[serde(default = "default_category")]
    pub category: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            topic_depth: default_depth(),
            topic_id: default_topic_id(),
            topic_broad: default_depth_1(),
            topic_medium: default_depth_2(),
            topic_description: default_description(),
            row_number: default_row_number(),
            assignment_broad: default_depth_1(),
            assignment_medium: default_depth_2(),
            title: default_title(),
            summary: default_summary(),
            category: default_category(),
        }
    }
}

fn default_depth() -> String {
    "depth".to_string()
}

fn default_topic_id() -> String {
    "topic_id".to_string()
}

fn default_depth_1() -> String {
    "topic_depth_1".to_string()
}

fn default_depth_2() -> String {
    "topic_depth_2".to_string()
}

fn default_description() -> String {
    "topic_description".to_string()
}

fn default_row_number() -> String {
    "row_number".to_string()
}

fn default_title() -> String {
    "title".to_string()
}

fn default_summary() -> String {
    "summary".to_string()
}

fn default_category() -> String {
    "category".to_string()
}

/// Score thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Minimum combined score for an excellent item.
    #[serde(default = "default_total_threshold")]
    pub total: f64,

    /// Minimum single-criterion score for an excellent item.
    #[serde(default = "default_criterion_threshold")]
    pub criterion: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            total: default_total_threshold(),
            criterion: default_criterion_threshold(),
        }
    }
}

fn default_total_threshold() -> f64 {
    12.0
}

fn default_criterion_threshold() -> f64 {
    4.0
}

/// Aggregation policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// What to do with topic nodes whose depth is neither 1 nor 2.
    #[serde(default)]
    pub other_depths: OtherDepthPolicy,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Number of topics listed in the "Top Topics" section.
    #[serde(default = "default_top_topics")]
    pub top_topics: usize,

    /// Include best-item columns in the Markdown tables.
    #[serde(default = "default_true")]
    pub include_best_items: bool,

    /// Include topics with no scored records in the Markdown tables.
    #[serde(default = "default_true")]
    pub include_empty_topics: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_topics: default_top_topics(),
            include_best_items: true,
            include_empty_topics: true,
        }
    }
}

fn default_top_topics() -> usize {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check settings that serde defaults cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.criteria.is_empty() {
            bail!("At least one scoring criterion must be configured");
        }

        let mut seen = HashSet::new();
        for criterion in &self.criteria {
            if criterion.key.trim().is_empty() {
                bail!("Criterion keys must not be empty");
            }
            if !seen.insert(criterion.key.as_str()) {
                bail!("Duplicate criterion key: {}", criterion.key);
            }
        }

        for (name, value) in [
            ("thresholds.total", self.thresholds.total),
            ("thresholds.criterion", self.thresholds.criterion),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a non-negative number, got {}", name, value);
            }
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        if let Some(total) = args.total_threshold {
            self.thresholds.total = total;
        }
        if let Some(criterion) = args.criterion_threshold {
            self.thresholds.criterion = criterion;
        }

        if args.drop_other_depths {
            self.aggregation.other_depths = OtherDepthPolicy::Drop;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.thresholds.total, 12.0);
        assert_eq!(config.thresholds.criterion, 4.0);
        assert_eq!(config.criteria.len(), 3);
        assert_eq!(config.columns.topic_broad, "topic_depth_1");
        assert_eq!(config.aggregation.other_depths, OtherDepthPolicy::ZeroFill);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "ideas.csv"
format = "csv"

[thresholds]
total = 10.5

[aggregation]
other_depths = "drop"

[[criteria]]
key = "impact"
label = "Impact"

[[criteria]]
key = "effort"
label = "Effort"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "ideas.csv");
        assert_eq!(config.general.format, OutputFormat::Csv);
        assert_eq!(config.thresholds.total, 10.5);
        assert_eq!(config.thresholds.criterion, 4.0);
        assert_eq!(config.aggregation.other_depths, OtherDepthPolicy::Drop);
        assert_eq!(config.criteria.len(), 2);
        assert_eq!(config.criteria[0].key, "impact");
        assert_eq!(config.columns.row_number, "row_number");
    }

    #[test]
    fn test_validate_rejects_duplicate_criteria() {
        let mut config = Config::default();
        config.criteria.push(Criterion::new("novelty_score", "Again"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut config = Config::default();
        config.thresholds.criterion = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[thresholds]\ncriterion = 3.0").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.thresholds.criterion, 3.0);
        assert_eq!(config.criteria.len(), 3);
    }

    #[test]
    fn test_load_rejects_empty_criteria() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "criteria = []").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[thresholds]"));
        assert!(toml_str.contains("[[criteria]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.criteria, Config::default().criteria);
    }
}

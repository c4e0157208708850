//! TopicRoll - per-topic summary tables from scored records
//!
//! A CLI tool that joins a topic taxonomy, topic assignments and
//! multi-criteria scores, and writes one summary row per topic.
//!
//! Exit codes:
//!   0 - Success (no unmatched records, or no --fail-on-unmatched set)
//!   1 - Runtime error (missing file, config, schema mismatch, etc.)
//!   2 - Unmatched scored records found with --fail-on-unmatched

mod analysis;
mod cli;
mod config;
mod dataset;
mod models;
mod report;

use analysis::AggregationSettings;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, InputSource, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use dataset::{Dataset, TableReader};
use models::{Report, ReportMetadata};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);

    info!("TopicRoll v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Roll-up failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .topicroll.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize columns, criteria, thresholds, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete roll-up. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid settings")?;

    let source = args
        .input_source()
        .context("No input tables given")?;
    let source_name = describe_source(&source);

    // Step 1: Load and validate the tables
    println!("📥 Loading dataset: {}", source_name);
    let reader = TableReader::new(&config.columns, &config.criteria);
    let dataset = dataset::load_dataset(&source, &reader)?;
    info!(
        "Loaded {} topics, {} assignments, {} scored records",
        dataset.topics.len(),
        dataset.assignments.len(),
        dataset.records.len()
    );

    if args.validate_only {
        return Ok(handle_validate_only(&dataset, args.fail_on_unmatched));
    }

    // Step 2: Aggregate
    println!("🧮 Aggregating {} topics...", dataset.topics.len());
    let settings = AggregationSettings::from(&config);
    debug!("Aggregation settings: {:?}", settings);

    let rows = analysis::aggregate(
        &dataset.topics,
        &dataset.assignments,
        &dataset.records,
        &settings,
    );

    let mut overview =
        analysis::overview(&dataset.topics, &dataset.assignments, &dataset.records, &rows);
    overview.coerced_cells = dataset.coerced_cells;

    if overview.unmatched_records > 0 {
        warn!(
            "{} scored records have no topic assignment",
            overview.unmatched_records
        );
    }
    if overview.dropped_topics > 0 {
        info!(
            "Dropped {} topics with unsupported depth",
            overview.dropped_topics
        );
    }

    // Step 3: Build the report
    println!("📝 Generating report...");

    let report = Report {
        metadata: ReportMetadata {
            source: source_name,
            generated_at: Utc::now(),
            criteria: settings.criteria.clone(),
            total_threshold: settings.total_threshold,
            criterion_threshold: settings.criterion_threshold,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        overview,
        rows,
    };

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
        OutputFormat::Csv => report::generate_csv_table(&report),
    };

    let output_path = &config.general.output;
    std::fs::write(output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path))?;

    // Print summary
    let with_items = report.rows.iter().filter(|r| r.item_count > 0).count();
    let excellent: usize = report
        .rows
        .iter()
        .filter(|r| r.depth == "1")
        .map(|r| r.excellent_count)
        .sum();

    println!("\n📊 Roll-up Summary:");
    println!(
        "   Topics: {} ({} with scored records)",
        report.rows.len(),
        with_items
    );
    println!(
        "   Records: {} matched, {} unmatched",
        report.overview.matched_records, report.overview.unmatched_records
    );
    println!(
        "   Excellent items in broad topics (>= {}): {}",
        settings.total_threshold, excellent
    );
    println!(
        "   Duration: {:.2}s",
        report.metadata.duration_seconds
    );
    println!("\n✅ Report saved to: {}", output_path);

    if args.fail_on_unmatched && report.overview.unmatched_records > 0 {
        eprintln!(
            "\n⛔ {} scored records have no topic assignment. Failing (exit code 2).",
            report.overview.unmatched_records
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --validate-only: report table sizes and exit.
fn handle_validate_only(dataset: &Dataset, fail_on_unmatched: bool) -> i32 {
    let overview = analysis::overview(
        &dataset.topics,
        &dataset.assignments,
        &dataset.records,
        &[],
    );

    println!("\n🔍 Schema check passed:\n");
    println!("   Topics:      {}", overview.topics);
    println!("   Assignments: {}", overview.assignments);
    println!(
        "   Records:     {} ({} unmatched)",
        overview.records, overview.unmatched_records
    );
    if dataset.coerced_cells > 0 {
        println!(
            "   Coerced score cells: {}",
            dataset.coerced_cells
        );
    }

    println!("\n✅ Validation complete. No report was written.");

    if fail_on_unmatched && overview.unmatched_records > 0 {
        2
    } else {
        0
    }
}

/// Human-readable description of the input source.
fn describe_source(source: &InputSource) -> String {
    match source {
        InputSource::Bundle(path) => path.display().to_string(),
        InputSource::Tables {
            topics,
            assignments,
            scores,
        } => format!(
            "{}, {}, {}",
            topics.display(),
            assignments.display(),
            scores.display()
        ),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

//! ForecastEx CLI: download daily price files and merge them into one table.
//!
//! Commands:
//! - `run`: download the configured range, then merge (default)
//! - `download`: fill missing days in the cache only
//! - `merge`: rebuild the master file from whatever is cached
//! - `cache status`: cached vs missing days for the configured range

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forecastex_core::data::{
    AcquireSummary, ForecastExSource, LogProgress, MergeOutcome, MergeSummary,
};
use forecastex_core::{pipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "forecastex",
    about = "ForecastEx CLI: daily settlement price downloader and merger"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the configured range, then merge the cache.
    Run,
    /// Download missing days into the cache without merging.
    Download {
        /// First day (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        start: Option<String>,

        /// Last day, inclusive (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        end: Option<String>,
    },
    /// Merge every cached day into the master file.
    Merge,
    /// Cache inspection commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached and missing days for the configured range.
    Status {
        /// Print the coverage report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_pipeline(&config),
        Commands::Download { start, end } => run_download(config, start, end),
        Commands::Merge => run_merge(&config),
        Commands::Cache { action } => match action {
            CacheAction::Status { json } => run_cache_status(&config, json),
        },
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forecastex=info,forecastex_core=info"));

    if std::env::var("FORECASTEX_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_source(config: &PipelineConfig) -> Result<ForecastExSource> {
    ForecastExSource::new(&config.source, config.request_timeout())
        .context("building HTTP client")
}

fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    let source = build_source(config)?;
    let report = pipeline::run(config, &source, &LogProgress)?;

    print_acquire_summary(&report.acquire);
    print_merge_outcome(&report.merge);
    Ok(())
}

fn run_download(
    mut config: PipelineConfig,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    if let Some(start) = start.as_deref() {
        config.range.start = parse_day(start)?;
    }
    if let Some(end) = end.as_deref() {
        config.range.end = parse_day(end)?;
    }
    config.validate().context("invalid date range")?;

    let source = build_source(&config)?;
    let summary = pipeline::acquire(&config, &source, &LogProgress)?;
    print_acquire_summary(&summary);
    Ok(())
}

fn run_merge(config: &PipelineConfig) -> Result<()> {
    let outcome = pipeline::merge(config)?;
    print_merge_outcome(&outcome);
    Ok(())
}

fn run_cache_status(config: &PipelineConfig, json: bool) -> Result<()> {
    let cache = config.day_cache();
    let range = config.date_range()?;
    let coverage = cache.coverage(&range);

    if json {
        println!("{}", serde_json::to_string_pretty(&coverage)?);
        return Ok(());
    }

    if !cache.dir().exists() {
        println!("Cache directory does not exist: {}", cache.dir().display());
    }
    let on_disk = cache.entries()?.len();

    println!("Cache:    {}", cache.dir().display());
    println!("Files:    {on_disk}");
    println!("Range:    {}", coverage.range);
    println!("Cached:   {} / {} days", coverage.cached, coverage.total);
    println!("Missing:  {}", coverage.missing.len());
    if !coverage.missing.is_empty() {
        println!();
        for run in missing_runs(&coverage.missing) {
            println!("  {run}");
        }
    }
    Ok(())
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date '{s}'"))
}

/// Collapse consecutive missing days into "a to b" spans.
fn missing_runs(days: &[NaiveDate]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut iter = days.iter().copied();
    let Some(mut first) = iter.next() else {
        return runs;
    };
    let mut last = first;
    for day in iter {
        if last.succ_opt() == Some(day) {
            last = day;
            continue;
        }
        runs.push(format_run(first, last));
        first = day;
        last = day;
    }
    runs.push(format_run(first, last));
    runs
}

fn format_run(first: NaiveDate, last: NaiveDate) -> String {
    if first == last {
        first.to_string()
    } else {
        format!("{first} to {last}")
    }
}

fn print_acquire_summary(summary: &AcquireSummary) {
    println!();
    println!("=== Download ===");
    println!("Days:       {}", summary.total);
    println!("Cached:     {}", summary.cached);
    println!("Fetched:    {}", summary.fetched);
    println!("No data:    {}", summary.no_data);
    println!("Failed:     {}", summary.faulted);
    for (date, err) in &summary.faults {
        println!("  {date}: {err}");
    }
    if summary.retry_eligible() > 0 {
        println!(
            "{} day(s) will be retried on the next run.",
            summary.retry_eligible()
        );
    }
}

fn print_merge_outcome(outcome: &MergeOutcome) {
    println!();
    match outcome {
        MergeOutcome::Written(summary) => print_merge_summary(summary),
        MergeOutcome::NoData {
            files_seen,
            skipped,
        } => {
            info!(files_seen, skipped = skipped.len(), "merge produced no rows");
            println!("No valid data found.");
        }
    }
}

fn print_merge_summary(summary: &MergeSummary) {
    println!("Success! Saved to {}", summary.output.display());
    println!("Total rows: {}", summary.rows);
    println!(
        "Days:       {} of {} file(s)",
        summary.days_contributed, summary.files_seen
    );
    for skipped in &summary.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.error);
    }
    if !summary.missing_price_column.is_empty() {
        println!(
            "No settlement column: {}",
            summary.missing_price_column.join(", ")
        );
    }
    if !summary.unpaired_days.is_empty() {
        println!("Odd row count: {}", summary.unpaired_days.join(", "));
    }
    println!("blake3: {}", summary.content_hash);
}

//! Candlekeep CLI — onboard, update and inspect commands.
//!
//! Commands:
//! - `onboard` — merge the bulk history with its gap-fill file, validate, publish
//! - `update` — append candles published since the last run to the recent file
//! - `inspect` — report range, schema health and statistics for a dataset file

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use candlekeep_core::config::PipelineConfig;
use candlekeep_core::data::{BitstampSource, CircuitBreaker, FetchError};
use candlekeep_core::domain::RawCandle;
use candlekeep_core::pipeline::{
    inspect, onboard, run_update, DatasetProfile, OnboardSummary, UpdateSummary,
};

#[derive(Parser)]
#[command(
    name = "candlekeep",
    about = "Candlekeep CLI — BTC/USD minute-candle history upkeep"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply to anything it omits.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the bulk history with its gap-fill file and publish it.
    Onboard {
        /// Bulk historical CSV (primary source).
        #[arg(long)]
        bulk: Option<PathBuf>,

        /// Gap-fill CSV, consulted only for timestamps the bulk file lacks.
        #[arg(long)]
        gap_fill: Option<PathBuf>,

        /// Published dataset path. A `.gz` suffix enables compression.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Gzip the published dataset.
        #[arg(long, default_value_t = false)]
        compress: bool,

        /// Skip the `.meta.json` sidecar.
        #[arg(long, default_value_t = false)]
        no_meta: bool,
    },
    /// Fetch candles published since the last known minute and append them.
    Update {
        /// Currency pair, e.g. btcusd.
        #[arg(long)]
        pair: Option<String>,

        /// Historical dataset; used for the last timestamp when no recent file exists.
        #[arg(long)]
        bulk: Option<PathBuf>,

        /// Recent dataset to extend.
        #[arg(long)]
        recent: Option<PathBuf>,

        /// Exchange API base URL.
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Report range, missing values, gaps and statistics for a dataset.
    Inspect {
        /// Dataset to inspect. Defaults to the published history.
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let step_secs = config.continuity.step_secs;

    match cli.command {
        Commands::Onboard {
            bulk,
            gap_fill,
            output,
            compress,
            no_meta,
        } => {
            let onboard_config = &mut config.onboard;
            if let Some(p) = bulk {
                onboard_config.bulk_path = p;
            }
            if let Some(p) = gap_fill {
                onboard_config.gap_fill_path = p;
            }
            if let Some(p) = output {
                onboard_config.output_path = p;
            }
            onboard_config.compress |= compress;
            onboard_config.write_meta &= !no_meta;

            let summary = onboard(&config.onboard, step_secs).context("onboarding failed")?;
            print_onboard(&summary);
            Ok(())
        }
        Commands::Update {
            pair,
            bulk,
            recent,
            base_url,
        } => {
            let update_config = &mut config.update;
            if let Some(p) = pair {
                update_config.pair = p;
            }
            if let Some(p) = bulk {
                update_config.bulk_path = p;
            }
            if let Some(p) = recent {
                update_config.recent_path = p;
            }
            if let Some(url) = base_url {
                update_config.base_url = url;
            }
            config.validate()?;

            let source = BitstampSource::new(
                &config.update.base_url,
                step_secs,
                config.update.timeout(),
                config.update.max_retries,
                CircuitBreaker::for_exchange(),
            )?;
            let now = chrono::Utc::now().timestamp();
            let summary =
                run_update(&config.update, step_secs, &source, now).context("update failed")?;
            print_update(&summary);
            if matches!(summary.fetch_error, Some(FetchError::CircuitBreakerTripped)) {
                println!(
                    "Exchange requests paused for another {} minutes.",
                    source.remaining_cooldown().as_secs().div_ceil(60)
                );
            }
            Ok(())
        }
        Commands::Inspect { path } => {
            let path = path.unwrap_or_else(|| config.onboard.published_path());
            let profile = inspect(&path, step_secs)
                .with_context(|| format!("inspecting {}", path.display()))?;
            println!("Dataset: {}", path.display());
            print_profile(&profile, step_secs);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn utc(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "out of range".into())
}

fn print_onboard(summary: &OnboardSummary) {
    let step = summary.report.step_secs;
    println!();
    println!("=== Onboarding Summary ===");
    println!("Bulk records:     {}", summary.primary_count);
    println!("Gap-fill records: {}", summary.gap_fill_count);
    println!(
        "Merged records:   {} ({} from gap-fill, {} shadowed by bulk)",
        summary.merged_count, summary.filled, summary.shadowed
    );

    if summary.report.gaps.is_empty() {
        println!("Continuity:       no gaps");
    } else {
        println!();
        println!("--- Continuity Gaps ({}) ---", summary.report.gaps.len());
        for gap in &summary.report.gaps {
            match gap.missing_range(step) {
                Some((first, last)) => println!(
                    "Gap from {} to {} ({} minutes)",
                    utc(first),
                    utc(last),
                    gap.missing_steps(step)
                ),
                None => println!(
                    "Misaligned step from {} to {} ({}s)",
                    utc(gap.before),
                    utc(gap.after),
                    gap.span_secs()
                ),
            }
        }
    }
    if let Some(boundary) = summary.report.boundary {
        println!();
        println!(
            "Truncated at:     {} ({boundary}); {} records dropped",
            utc(boundary),
            summary.dropped()
        );
    }

    println!();
    println!("Published:        {} records", summary.published_count);
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        println!("Range:            {} to {}", utc(first), utc(last));
    }
    println!("Output:           {}", summary.output.display());
    if let Some(meta) = &summary.meta_path {
        println!("Metadata:         {}", meta.display());
    }
    println!();
}

fn print_update(summary: &UpdateSummary) {
    println!();
    println!("=== Update Summary ===");
    println!("Last known:       {} ({})", utc(summary.last_known), summary.last_known);
    match summary.interval {
        None => println!("Already up to date."),
        Some((start, end)) => {
            println!("Requested:        {} to {}", utc(start), utc(end));
            println!("Pages:            {}", summary.pages);
            println!("Fetched:          {} records", summary.fetched);
        }
    }
    if let Some(err) = &summary.fetch_error {
        println!("WARNING: fetching stopped early: {err}");
    }
    if summary.written {
        println!(
            "Recent file:      {} ({} records, {} new)",
            summary.recent_path.display(),
            summary.total_rows,
            summary.appended()
        );
    } else if summary.interval.is_some() {
        println!("No new data found to append.");
    }
    if !summary.integrity.missing_minutes.is_empty() {
        println!(
            "WARNING: {} missing minutes in recent file",
            summary.integrity.missing_minutes.len()
        );
    }
    if summary.integrity.null_rows > 0 {
        println!("WARNING: {} rows with null values", summary.integrity.null_rows);
    }
    println!();
}

fn print_profile(profile: &DatasetProfile, step_secs: i64) {
    println!("Records:          {}", profile.row_count);
    if let (Some(first), Some(last)) = (profile.first_timestamp, profile.last_timestamp) {
        println!("Range (epoch):    {first} to {last}");
        println!("Range (UTC):      {} to {}", utc(first), utc(last));
    }
    println!("Sorted:           {}", if profile.sorted { "yes" } else { "no" });
    println!("Duplicates:       {}", profile.duplicate_timestamps);
    println!(
        "Gaps:             {} ({} missing {}s steps)",
        profile.gap_count, profile.missing_steps, step_secs
    );

    println!();
    println!("--- Missing Values ---");
    for (field, count) in &profile.missing {
        println!("{:<10} {count}", field.name());
    }

    println!();
    println!("--- Statistics ---");
    println!(
        "{:<10} {:>10} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in &profile.columns {
        println!(
            "{:<10} {:>10} {:>16.4} {:>16.4} {:>16.4} {:>16.4} {:>16.4} {:>16.4} {:>16.4}",
            s.name, s.count, s.mean, s.std, s.min, s.p25, s.p50, s.p75, s.max
        );
    }

    println!();
    println!("--- First {} Rows ---", profile.head.len());
    print_rows(&profile.head);
    println!();
    println!("--- Last {} Rows ---", profile.tail.len());
    print_rows(&profile.tail);
    println!();
}

fn print_rows(rows: &[RawCandle]) {
    fn cell(v: Option<f64>) -> String {
        v.map(|v| v.to_string()).unwrap_or_else(|| "NaN".into())
    }
    println!(
        "{:>12} {:>12} {:>12} {:>12} {:>12} {:>16}",
        "timestamp", "open", "high", "low", "close", "volume"
    );
    for r in rows {
        println!(
            "{:>12} {:>12} {:>12} {:>12} {:>12} {:>16}",
            r.timestamp,
            cell(r.open),
            cell(r.high),
            cell(r.low),
            cell(r.close),
            cell(r.volume)
        );
    }
}

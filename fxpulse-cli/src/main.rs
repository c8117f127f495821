//! FxPulse CLI — daily pipeline, single stages, and store inspection.
//!
//! Commands:
//! - `run` — fetch, analyze, render, and publish in one pass
//! - `fetch` — refresh the currency and/or event stores
//! - `analyze` — print the analysis summary (or full JSON)
//! - `render` — write charts and exports into the assets directory
//! - `publish` — build the markdown site from the rendered assets
//! - `store status` — report coverage and size of both stores

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use fxpulse_core::data::{SourceReport, StoreStatus};
use fxpulse_pipeline::{
    Analysis, FetchTarget, Pipeline, PipelineConfig, PipelineReport, Providers, PublishReport,
    RenderReport, RunOptions,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "pipeline.toml";

#[derive(Parser)]
#[command(
    name = "fxpulse",
    about = "FxPulse — world events vs currency moves, refreshed daily"
)]
struct Cli {
    /// Pipeline config (TOML). Defaults to ./pipeline.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, analyze, render, and publish.
    Run {
        /// Use deterministic offline data instead of Yahoo Finance and GDELT.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Run as of this date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        today: Option<String>,

        /// Analyze the stored data without fetching.
        #[arg(long, default_value_t = false)]
        skip_fetch: bool,
    },
    /// Refresh the stores from their last stored dates.
    Fetch {
        #[arg(long, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Use deterministic offline data instead of Yahoo Finance and GDELT.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Fetch as of this date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        today: Option<String>,
    },
    /// Analyze the stored data and print the results.
    Analyze {
        /// Print the full analysis as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Render charts and exports into the assets directory.
    Render,
    /// Build the site pages from the rendered assets.
    Publish {
        /// Date shown on the pages (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        today: Option<String>,
    },
    /// Store inspection.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Report date coverage, rows, partitions, and size of both stores.
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Currencies,
    Events,
    All,
}

impl From<SourceArg> for FetchTarget {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Currencies => FetchTarget::Currencies,
            SourceArg::Events => FetchTarget::Events,
            SourceArg::All => FetchTarget::All,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let pipeline = Pipeline::new(load_config(cli.config.as_deref())?)?;

    match cli.command {
        Commands::Run {
            synthetic,
            today,
            skip_fetch,
        } => run_pipeline(&pipeline, synthetic, today, skip_fetch),
        Commands::Fetch {
            source,
            synthetic,
            today,
        } => run_fetch(&pipeline, source, synthetic, today),
        Commands::Analyze { json } => run_analyze(&pipeline, json),
        Commands::Render => run_render(&pipeline),
        Commands::Publish { today } => run_publish(&pipeline, today),
        Commands::Store { action } => match action {
            StoreAction::Status => run_store_status(&pipeline),
        },
    }
}

/// Logs go to stderr; stdout carries command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FXPULSE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            PipelineConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("failed to load {DEFAULT_CONFIG}"))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn parse_today(today: Option<String>) -> Result<NaiveDate> {
    match today {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD")),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}

fn providers(synthetic: bool) -> Providers {
    if synthetic {
        Providers::Synthetic
    } else {
        Providers::Live
    }
}

fn run_pipeline(
    pipeline: &Pipeline,
    synthetic: bool,
    today: Option<String>,
    skip_fetch: bool,
) -> Result<()> {
    let options = RunOptions {
        today: parse_today(today)?,
        providers: providers(synthetic),
        skip_fetch,
    };
    let report = pipeline.run(&options)?;
    print_run_summary(&report);
    Ok(())
}

fn run_fetch(
    pipeline: &Pipeline,
    source: SourceArg,
    synthetic: bool,
    today: Option<String>,
) -> Result<()> {
    let today = parse_today(today)?;
    let reports = pipeline.fetch(providers(synthetic), source.into(), today)?;
    for report in &reports {
        print_source_report(report);
    }
    if reports.iter().any(|r| !r.is_clean()) {
        std::process::exit(1);
    }
    Ok(())
}

fn run_analyze(pipeline: &Pipeline, json: bool) -> Result<()> {
    let analysis = pipeline.analyze()?;
    if json {
        let out = serde_json::to_string_pretty(&analysis)
            .context("failed to serialize analysis to JSON")?;
        println!("{out}");
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn run_render(pipeline: &Pipeline) -> Result<()> {
    let analysis = pipeline.analyze()?;
    let report = pipeline.render(&analysis)?;
    print_render(&report);
    if !report.is_complete() {
        bail!("{} asset(s) failed to render", report.failed.len());
    }
    Ok(())
}

fn run_publish(pipeline: &Pipeline, today: Option<String>) -> Result<()> {
    let analysis = pipeline.analyze()?;
    let report = pipeline.publish(&analysis, parse_today(today)?);
    print_publish(&report);
    if !report.is_complete() {
        bail!("{} publish step(s) failed", report.failed.len());
    }
    Ok(())
}

fn run_store_status(pipeline: &Pipeline) -> Result<()> {
    let currency = pipeline.currency_store().status()?;
    let event = pipeline.event_store().status()?;

    println!("Data dir: {}", pipeline.config().data_dir.display());
    println!();
    println!(
        "{:<12} {:<25} {:>10} {:<12} {:>6} {:>10}",
        "Store", "Date Range", "Rows", "Partitions", "Quar.", "Size"
    );
    println!("{}", "-".repeat(80));
    for status in [&currency, &event] {
        print_store_row(status);
    }
    Ok(())
}

fn print_store_row(status: &StoreStatus) {
    let (range, rows) = match &status.meta {
        Some(meta) => (
            format!("{} to {}", meta.start_date, meta.end_date),
            meta.row_count.to_string(),
        ),
        None => ("(empty)".to_string(), "0".to_string()),
    };
    let partitions = match (status.partitions.first(), status.partitions.last()) {
        (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
        (Some(first), _) => first.to_string(),
        _ => "-".to_string(),
    };
    println!(
        "{:<12} {:<25} {:>10} {:<12} {:>6} {:>10}",
        status.store,
        range,
        rows,
        partitions,
        status.quarantined,
        format_size(status.bytes)
    );
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn print_source_report(report: &SourceReport) {
    let window = report
        .window
        .map(|(s, e)| format!("{s} to {e}"))
        .unwrap_or_else(|| "up to date".to_string());
    println!(
        "{:<16} {:<25} fetched {:>7}  inserted {:>7}  duplicates {:>5}",
        report.source, window, report.fetched, report.append.inserted, report.append.duplicates
    );
    if report.stopped_early {
        println!("  stopped early");
    }
    for (what, err) in &report.errors {
        println!("  ERROR {what}: {err}");
    }
}

fn print_analysis(analysis: &Analysis) {
    let cov = &analysis.coverage;
    let range = |s: Option<NaiveDate>, e: Option<NaiveDate>| match (s, e) {
        (Some(s), Some(e)) => format!("{s} to {e}"),
        _ => "(none)".to_string(),
    };

    println!();
    println!("=== Analysis ===");
    println!(
        "Currencies:     {} ({} rows, {})",
        cov.currencies,
        cov.currency_rows,
        range(cov.currency_start, cov.currency_end)
    );
    println!(
        "Events:         {} types ({} rows, {})",
        cov.event_types,
        cov.event_rows,
        range(cov.event_start, cov.event_end)
    );
    println!("Joined days:    {}", cov.joined_days);
    println!();

    let regression = &analysis.regression;
    println!("--- USD strength regression ---");
    match regression.r_squared {
        Some(r2) if regression.fitted => {
            println!("R²:             {r2:.4}");
            println!("{:<24} {:>12} {:>10} {:<10}", "Event type", "Coef", "p-value", "Impact");
            for i in regression.ranked().into_iter().take(10) {
                let p = i
                    .p_value
                    .map(|p| format!("{p:.4}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<24} {:>+12.6} {:>10} {:<10}",
                    i.event_type,
                    i.coef,
                    p,
                    i.impact.label()
                );
            }
        }
        _ => println!("not fitted ({} observations)", regression.observations),
    }
    println!();
    println!(
        "Spikes/dips:    {}",
        analysis.spikes.events.len()
    );
    println!("Currency models:{}", analysis.currency_models.len());
    println!();
}

fn print_render(report: &RenderReport) {
    println!("Rendered {} asset(s)", report.written.len());
    for (name, err) in &report.failed {
        println!("  FAILED {name}: {err}");
    }
}

fn print_publish(report: &PublishReport) {
    println!(
        "Published {} page(s), copied {} asset(s)",
        report.pages.len(),
        report.copied_assets
    );
    for (page, key) in &report.unknown_placeholders {
        println!("  WARNING {page}: unknown placeholder {{{{ {key} }}}}");
    }
    for (name, err) in &report.failed {
        println!("  FAILED {name}: {err}");
    }
}

fn print_run_summary(report: &PipelineReport) {
    if report.fetch.is_empty() {
        println!("Fetch: skipped");
    }
    for source in &report.fetch {
        print_source_report(source);
    }
    print_analysis(&report.analysis);
    print_render(&report.render);
    print_publish(&report.publish);
    if !report.is_clean() {
        println!();
        println!("WARNING: run finished with errors; see log");
    }
}

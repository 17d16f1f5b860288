use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showdown_stats::config::AppConfig;
use showdown_stats::export::Exporter;
use showdown_stats::ingest::{ingest_period, IngestTally};
use showdown_stats::models::PeriodKey;
use showdown_stats::snapshot::load_snapshots;
use showdown_stats::storage::{PeriodStore, StorageConfig};

#[derive(Parser)]
#[command(name = "showdown-stats")]
#[command(about = "Per-period Pokemon Showdown battle statistics store and exporter")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Directory holding period stores (overrides config)
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Directory receiving export documents (overrides config)
    #[arg(long)]
    publication_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest downloaded snapshot files into a period store
    Ingest {
        /// Stats period (YYYY-MM)
        #[arg(long)]
        period: String,

        /// Directory of snapshot files (overrides config)
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },

    /// Export every period store to JSON and rebuild the index
    Export,

    /// Ingest a period, then export all periods
    Update {
        /// Stats period (YYYY-MM)
        #[arg(long)]
        period: String,

        /// Directory of snapshot files (overrides config)
        #[arg(long)]
        raw_dir: Option<PathBuf>,
    },

    /// Show totals for a period store
    Summary {
        /// Stats period (YYYY-MM)
        #[arg(long)]
        period: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    if let Some(data_root) = cli.data_root {
        config.data_root = data_root;
    }
    if let Some(publication_root) = cli.publication_root {
        config.publication_root = publication_root;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    config.validate()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting showdown-stats v{}", env!("CARGO_PKG_VERSION"));

    let storage = config.storage();

    match cli.command {
        Commands::Ingest { period, raw_dir } => {
            let period = parse_period(&period)?;
            let raw_dir = raw_dir.unwrap_or_else(|| config.raw_dir.clone());
            run_ingest(&storage, &period, &raw_dir)?;
        }
        Commands::Export => {
            run_export(&storage)?;
        }
        Commands::Update { period, raw_dir } => {
            let period = parse_period(&period)?;
            let raw_dir = raw_dir.unwrap_or_else(|| config.raw_dir.clone());
            run_ingest(&storage, &period, &raw_dir)?;
            run_export(&storage)?;
        }
        Commands::Summary { period } => {
            let period = parse_period(&period)?;
            print_summary(&storage, &period)?;
        }
    }

    Ok(())
}

fn parse_period(s: &str) -> Result<PeriodKey> {
    Ok(PeriodKey::parse(s)?)
}

fn run_ingest(storage: &StorageConfig, period: &PeriodKey, raw_dir: &Path) -> Result<IngestTally> {
    let snapshots = load_snapshots(raw_dir)
        .with_context(|| format!("Failed to list snapshots in {:?}", raw_dir))?;
    if snapshots.is_empty() {
        bail!("No snapshot files found in {:?}", raw_dir);
    }
    tracing::info!("Found {} snapshot files in {:?}", snapshots.len(), raw_dir);

    let tally = ingest_period(storage, period, &snapshots)
        .with_context(|| format!("Cannot open store for {}", period))?;

    println!("\n=== Ingest Results ({}) ===", period);
    println!("Succeeded:        {}", tally.succeeded);
    println!("Failed:           {}", tally.failed);
    if !tally.failures.is_empty() {
        println!("\nFailures:");
        for failure in &tally.failures {
            println!("  - {}", failure);
        }
    }

    if let Err(e) = print_summary(storage, period) {
        tracing::warn!("Could not summarize store for {}: {:#}", period, e);
    }

    if tally.is_total_failure() {
        bail!("No snapshots were ingested for {}", period);
    }
    Ok(tally)
}

fn run_export(storage: &StorageConfig) -> Result<()> {
    let summary = Exporter::new(storage.clone())
        .export_all()
        .context("Export failed")?;

    if summary.is_empty() {
        println!("Nothing to export in {:?}", storage.data_root);
        return Ok(());
    }

    let exported: Vec<&str> = summary.exported.iter().map(|p| p.as_str()).collect();
    println!("\n=== Export Results ===");
    println!(
        "Exported {} periods: {}",
        exported.len(),
        exported.join(", ")
    );
    if let Some(index) = &summary.index {
        println!("Latest period:    {}", index.latest);
    }
    if !summary.failures.is_empty() {
        println!("\nFailures:");
        for failure in &summary.failures {
            println!("  - {}: {}", failure.period, failure.error);
        }
    }
    if let Some(e) = &summary.index_error {
        println!("Index not written: {}", e);
    }

    if summary.exported.is_empty() {
        bail!("No periods were exported");
    }
    if summary.index_error.is_some() {
        bail!("Exported {} periods but could not write the index", exported.len());
    }
    Ok(())
}

fn print_summary(storage: &StorageConfig, period: &PeriodKey) -> Result<()> {
    let path = storage.store_path(period);
    if !path.exists() {
        bail!("No store for {} at {:?}", period, path);
    }

    let store = PeriodStore::open(storage, period)?;
    println!("\n=== Database Summary - {} ===", period);
    println!("Store:            {:?}", store.path());
    println!("Total battles:    {}", store.total_battles()?);
    println!("Combinations:     {}", store.record_count()?);
    println!("Unique formats:   {}", store.distinct_formats()?.len());
    store.close()?;

    Ok(())
}

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use modd_organizer::config::parse_tz_offset;
use modd_organizer::{Config, HashPolicy, Pipeline, PipelineReport};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "modd-organizer")]
#[command(version, about = "Decode camcorder .modd sidecars and index their videos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the standard search paths)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Camera timezone: est, cst, mst, pst or an offset in seconds
    #[arg(long, global = true)]
    tz: Option<String>,

    /// Number of concurrent hash workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Hash whole video files instead of the leading tenth
    #[arg(long, global = true)]
    full_hash: bool,

    /// SQLite database for `sync`
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Single-line JSON output
    #[arg(long, global = true)]
    compact: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode every sidecar under a directory and print the records
    Scan {
        /// Directory to walk
        dir: PathBuf,
    },
    /// Match sidecars with their videos and print the content-hash index
    Index {
        /// Directory to walk
        dir: PathBuf,
    },
    /// Index a directory and upsert the results into the database
    Sync {
        /// Directory to walk
        dir: PathBuf,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for JSON output
    let filter = if cli.verbose {
        "modd_organizer=debug,modd_core=debug,warn"
    } else {
        "modd_organizer=info,modd_core=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Scan { ref dir } => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.scan(dir).await?;
            print_json(&report.records, pipeline.config())?;
            log_report(&report);
        }
        Commands::Index { ref dir } => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.index(dir).await?;
            print_json(&report.index, pipeline.config())?;
            log_report(&report);
        }
        Commands::Sync { ref dir } => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.sync(dir).await?;
            print_json(&report.summary(), pipeline.config())?;
            log_report(&report);
        }
    }

    Ok(())
}

/// Config file (or the defaults), then command-line overrides
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(tz) = &cli.tz {
        config.decode.tz_offset_seconds = parse_tz_offset(tz)?;
    }
    if let Some(workers) = cli.workers {
        if workers == 0 {
            return Err(anyhow!("--workers must be greater than 0"));
        }
        config.association.max_workers = workers;
    }
    if cli.full_hash {
        config.association.hash_policy = HashPolicy::FullFile;
    }
    if let Some(database) = &cli.database {
        config.output.database_path = Some(database.clone());
    }
    if cli.compact {
        config.output.pretty_json = false;
    }

    config.validate()?;
    tracing::debug!("{}", config.summary());
    Ok(config)
}

fn print_json<T: Serialize>(value: &T, config: &Config) -> Result<()> {
    let json = if config.output.pretty_json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}

fn log_report(report: &PipelineReport) {
    let summary = report.summary();

    info!(
        "🎉 {} finished in {:.2}s",
        report.root.display(),
        report.total_time.as_secs_f64()
    );
    info!(
        "📄 Sidecars: {} seen, {} decoded",
        summary.sidecars_seen, summary.records
    );
    if !report.index.is_empty() {
        info!("📹 Videos indexed: {}", summary.videos);
    }
    if let Some(stats) = &report.sync {
        info!(
            "💾 Database: {} inserted, {} updated, {} unchanged, {} superseded copies",
            stats.inserted, stats.updated, stats.unchanged, stats.superseded
        );
    }

    if !summary.skipped.is_empty() {
        warn!("⚠️ Skipped {} files:", summary.skipped.len());
        for skipped in &summary.skipped {
            warn!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}

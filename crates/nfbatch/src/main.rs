//! nfbatch - batch extraction of NFS-e service invoices.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::info;

use nfbatch::config::{default_config_path, load_config, LookupConfig};
use nfbatch::logging::init_logging;
use nfbatch::pipeline::{CancelToken, LogProgress, Pipeline};
use nfbatch::{Config, Guardian};

/// Validate, split and extract batches of scanned service invoices
#[derive(Parser)]
#[command(name = "nfbatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run intake, segmentation, extraction and enrichment on a batch directory
    Run {
        /// Batch directory
        dir: PathBuf,

        /// Lookup table (CSV) overriding the configured one
        #[arg(long)]
        lookup: Option<PathBuf>,

        /// Number of extraction workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Only unpack, classify and rename the files of a batch directory
    Intake {
        /// Batch directory
        dir: PathBuf,
    },

    /// Validate a config file and print the effective configuration
    CheckConfig {
        /// Config file (defaults to --config or the user config location)
        path: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Run {
            dir,
            lookup,
            workers,
            output,
        } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(path) = lookup {
                config.lookup = Some(LookupConfig::new(path.to_string_lossy()));
            }
            if let Some(count) = workers {
                config.worker_count = count.max(1);
            }
            run_batch(&config, &dir, output.as_deref())
        }
        Commands::Intake { dir } => {
            let report = Guardian::new().validate(&dir)?;
            print_json(&report, None)
        }
        Commands::CheckConfig { path } => {
            let path = path
                .or(cli.config)
                .or_else(default_config_path)
                .context("No config file given and no user config directory")?;
            let config = load_config(&path)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            eprintln!("{} is valid", path.display());
            print_json(&config, None)
        }
    }
}

/// Explicit path, then the user config file if it exists, then defaults.
fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    match default_config_path().filter(|p| p.exists()) {
        Some(path) => {
            info!("Using config {}", path.display());
            load_config(&path).with_context(|| format!("Failed to load config {}", path.display()))
        }
        None => {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn run_batch(config: &Config, dir: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("Cancelling after the current stage...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let pipeline = Pipeline::from_config(config).context("Failed to set up extraction client")?;
    let report = pipeline.run(dir, &LogProgress, &cancel)?;

    if report.failed > 0 {
        eprintln!(
            "{} of {} invoices failed; see batch.errors in the report",
            report.failed,
            report.records.len()
        );
    }
    print_json(&report, output)
}

fn print_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

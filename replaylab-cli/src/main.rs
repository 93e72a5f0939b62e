//! ReplayLab CLI — batch replays and dataset inspection.
//!
//! Commands:
//! - `run` — run a strategy × dataset batch from a TOML config or from flags
//! - `inspect` — load one data directory and report what ingestion kept

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use replaylab_core::data::{BarStore, LoadOptions};
use replaylab_runner::{render_table, run_batch, write_json, BatchConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI — offline market-data replay and strategy comparison"
)]
struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured strategy over every dataset.
    Run {
        /// Path to a TOML batch config. Flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Root directory holding the dataset directories.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Dataset (subdirectory of the data dir). Repeatable.
        #[arg(long = "dataset")]
        datasets: Vec<String>,

        #[arg(long)]
        initial_cash: Option<f64>,

        /// Reject orders that would take cash below this floor.
        #[arg(long)]
        cash_buffer: Option<f64>,

        /// Keep at most this many valid rows per file.
        #[arg(long)]
        max_rows: Option<usize>,

        /// Run strategies of a dataset in parallel.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Write the batch report as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Load a data directory and print the ingestion report.
    Inspect {
        /// Directory of CSV files.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        #[arg(long)]
        max_rows: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            datasets,
            initial_cash,
            cash_buffer,
            max_rows,
            parallel,
            json,
        } => {
            let mut batch = match &config {
                Some(path) => BatchConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => BatchConfig::default(),
            };
            if let Some(dir) = data_dir {
                batch.data_dir = dir;
            }
            if !datasets.is_empty() {
                batch.datasets = datasets;
            }
            if let Some(cash) = initial_cash {
                batch.initial_cash = cash;
            }
            if cash_buffer.is_some() {
                batch.cash_buffer = cash_buffer;
            }
            if max_rows.is_some() {
                batch.max_rows = max_rows;
            }
            batch.parallel |= parallel;
            batch.validate()?;

            run_cmd(&batch, json)
        }
        Commands::Inspect { data_dir, max_rows } => inspect_cmd(data_dir, max_rows),
    }
}

/// RUST_LOG wins over `--log-level`. Logs go to stderr, tables to stdout.
fn init_logging(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_cmd(batch: &BatchConfig, json: Option<PathBuf>) -> Result<()> {
    let report = run_batch(batch);
    tracing::info!(
        runs = report.results.len(),
        failed = report.failures.len(),
        datasets = report.datasets.len(),
        "batch finished"
    );

    print!("{}", render_table(&report));
    for (dataset, info) in &report.datasets {
        println!(
            "{dataset}: {} files, {} rows kept, {} rejected, {} files skipped{}",
            info.files,
            info.rows_accepted,
            info.rows_rejected,
            info.skipped_files,
            info.fingerprint
                .as_deref()
                .map(|f| format!(", fingerprint {}", &f[..f.len().min(16)]))
                .unwrap_or_default(),
        );
    }

    if let Some(path) = json {
        write_json(&report, &path)?;
        println!("Report written to: {}", path.display());
    }

    if !report.is_clean() {
        bail!("{} run(s) failed", report.failures.len());
    }
    Ok(())
}

fn inspect_cmd(data_dir: PathBuf, max_rows: Option<usize>) -> Result<()> {
    let options = LoadOptions::default().with_max_rows(max_rows);
    let (store, report) = BarStore::load(&data_dir, &options)?;

    println!("Data directory: {}", data_dir.display());
    println!("{:<28} {:>10} {:>10} {:>9}", "File symbol", "Read", "Kept", "Rejected");
    for file in &report.files {
        println!(
            "{:<28} {:>10} {:>10} {:>9}{}",
            file.symbol,
            file.rows_read,
            file.rows_accepted,
            file.rows_rejected,
            if file.truncated { "  (truncated)" } else { "" }
        );
    }
    for skipped in &report.skipped {
        println!("skipped {}: {}", skipped.path.display(), skipped.issue);
    }

    println!();
    println!("Symbols:     {}", store.len());
    println!("Bars:        {}", store.total_bars());
    if let (Some(first), Some(last)) = (store.first_timestamp(), store.last_timestamp()) {
        println!("Range:       {first} .. {last}");
    }
    println!("Duplicates:  {}", report.duplicates_dropped);
    println!("Fingerprint: {}", store.fingerprint());
    Ok(())
}

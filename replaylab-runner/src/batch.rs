//! Strategy × dataset batch execution.
//!
//! Datasets are processed in config order. An in-memory dataset is loaded
//! once and every strategy gets its own `Replayer` over the shared store;
//! with `parallel = true` those runs go to the rayon pool. Streaming
//! datasets open one `ChunkedReplayer` per run and always run sequentially.
//!
//! Nothing here aborts the batch: load errors, bad strategy parameters and
//! strategy failures are recorded per run and the batch moves on.

use crate::config::{BatchConfig, StrategyEntry};
use crate::dataset::DatasetCache;
use rayon::prelude::*;
use replaylab_core::data::{
    ChunkedReplayer, DataError, LoadReport, Replayer, SnapshotSource, StreamOptions,
};
use replaylab_core::engine::{
    Backtest, BacktestConfig, RunError, RunResult, RunSummary, StrategyError,
};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Identifies one run in a batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub strategy: String,
    pub dataset: String,
}

impl RunKey {
    pub fn new(strategy: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.strategy, self.dataset)
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// A run that produced no summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub key: RunKey,
    pub message: String,
}

/// What loading a dataset looked like.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Content hash of the loaded bars; absent for streamed datasets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub files: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    pub skipped_files: usize,
    pub truncated_files: usize,
}

impl DatasetInfo {
    fn from_report(report: &LoadReport, fingerprint: Option<String>) -> Self {
        Self {
            fingerprint,
            files: report.files.len(),
            rows_accepted: report.rows_accepted(),
            rows_rejected: report.rows_rejected(),
            skipped_files: report.skipped.len(),
            truncated_files: report.truncated_files(),
        }
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    #[serde(serialize_with = "serialize_results")]
    pub results: BTreeMap<RunKey, RunSummary>,
    pub failures: Vec<RunFailure>,
    pub datasets: BTreeMap<String, DatasetInfo>,
}

impl BatchReport {
    pub fn get(&self, strategy: &str, dataset: &str) -> Option<&RunSummary> {
        self.results.get(&RunKey::new(strategy, dataset))
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, key: RunKey, outcome: Result<RunResult, BatchError>) {
        match outcome {
            Ok(result) => {
                tracing::info!(
                    run = %key,
                    return_pct = result.summary.total_return_pct,
                    fills = result.summary.fill_count,
                    rejected = result.rejected.len(),
                    "run complete"
                );
                self.results.insert(key, result.summary);
            }
            Err(e) => {
                tracing::warn!(run = %key, error = %e, "run failed");
                self.failures.push(RunFailure {
                    key,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// JSON maps need string keys, so results go out as a list of rows.
fn serialize_results<S: Serializer>(
    results: &BTreeMap<RunKey, RunSummary>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Row<'a> {
        strategy: &'a str,
        dataset: &'a str,
        #[serde(flatten)]
        summary: &'a RunSummary,
    }

    serializer.collect_seq(results.iter().map(|(key, summary)| Row {
        strategy: &key.strategy,
        dataset: &key.dataset,
        summary,
    }))
}

/// Run every configured strategy over every dataset it applies to.
pub fn run_batch(config: &BatchConfig) -> BatchReport {
    let mut report = BatchReport::default();
    let mut cache = DatasetCache::new(config.load_options());
    let backtest = config.backtest_config();

    for (dataset, dir) in config.dataset_dirs() {
        let entries: Vec<&StrategyEntry> = config
            .strategies
            .iter()
            .filter(|e| e.applies_to(&dataset))
            .collect();
        if entries.is_empty() {
            continue;
        }
        tracing::info!(%dataset, dir = %dir.display(), runs = entries.len(), "dataset started");

        match config.streaming {
            Some(stream) => {
                run_streaming(config, &dataset, &dir, stream, &entries, &backtest, &mut report)
            }
            None => run_in_memory(
                &mut cache,
                config.parallel,
                &dataset,
                &dir,
                &entries,
                &backtest,
                &mut report,
            ),
        }
    }

    tracing::info!(
        runs = report.results.len(),
        failures = report.failures.len(),
        "batch finished"
    );
    report
}

fn run_in_memory(
    cache: &mut DatasetCache,
    parallel: bool,
    dataset: &str,
    dir: &Path,
    entries: &[&StrategyEntry],
    backtest: &BacktestConfig,
    report: &mut BatchReport,
) {
    let store = match cache.get_or_load(dataset, dir) {
        Ok(loaded) => {
            report.datasets.insert(
                dataset.to_string(),
                DatasetInfo::from_report(&loaded.report, Some(loaded.fingerprint.clone())),
            );
            std::sync::Arc::clone(&loaded.store)
        }
        Err(e) => {
            fail_all(report, dataset, entries, &e.to_string());
            return;
        }
    };

    let run = |entry: &&StrategyEntry| {
        let key = RunKey::new(entry.name(), dataset);
        let outcome = Replayer::new(std::sync::Arc::clone(&store))
            .map_err(BatchError::from)
            .and_then(|source| run_one(entry, source, backtest));
        (key, outcome)
    };

    let outcomes: Vec<(RunKey, Result<RunResult, BatchError>)> = if parallel {
        entries.par_iter().map(run).collect()
    } else {
        entries.iter().map(run).collect()
    };
    for (key, outcome) in outcomes {
        report.record(key, outcome);
    }

    // later datasets never reuse this one
    cache.evict(dataset);
}

fn run_streaming(
    config: &BatchConfig,
    dataset: &str,
    dir: &Path,
    stream: StreamOptions,
    entries: &[&StrategyEntry],
    backtest: &BacktestConfig,
    report: &mut BatchReport,
) {
    let load_options = config.load_options();
    for entry in entries {
        let key = RunKey::new(entry.name(), dataset);
        let outcome = ChunkedReplayer::open(dir, &load_options, stream)
            .map_err(BatchError::from)
            .and_then(|source| {
                let strategy = entry.spec.build(&key.strategy)?;
                let (result, source) =
                    Backtest::new(source, strategy, backtest.clone()).run_with_source()?;
                report
                    .datasets
                    .entry(dataset.to_string())
                    .or_insert_with(|| DatasetInfo::from_report(&source.report(), None));
                Ok(result)
            });
        report.record(key, outcome);
    }
}

fn run_one<S: SnapshotSource>(
    entry: &StrategyEntry,
    source: S,
    config: &BacktestConfig,
) -> Result<RunResult, BatchError> {
    let strategy = entry.spec.build(&entry.name())?;
    Ok(Backtest::new(source, strategy, config.clone()).run()?)
}

fn fail_all(report: &mut BatchReport, dataset: &str, entries: &[&StrategyEntry], message: &str) {
    tracing::error!(%dataset, error = %message, "dataset could not be loaded");
    for entry in entries {
        report.failures.push(RunFailure {
            key: RunKey::new(entry.name(), dataset),
            message: message.to_string(),
        });
    }
}

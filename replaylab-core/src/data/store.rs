//! Bar Store: per-symbol, chronologically ordered bar series.
//!
//! The store is immutable once built. Runs share it behind an `Arc` and keep
//! their own cursors in a [`Replayer`](super::Replayer).

use super::csv_source::{BarFile, FileStats};
use super::error::{DataError, FileIssue};
use super::symbol::SymbolResolver;
use crate::domain::PriceBar;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Options for a full directory load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Keep only the first N valid rows of each file.
    pub max_rows_per_file: Option<usize>,
    pub resolver: SymbolResolver,
}

impl LoadOptions {
    pub fn with_max_rows(mut self, max_rows: Option<usize>) -> Self {
        self.max_rows_per_file = max_rows;
        self
    }
}

/// A file that was not ingested at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub issue: FileIssue,
}

/// What a load did, file by file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub files: Vec<FileStats>,
    pub skipped: Vec<SkippedFile>,
    /// Bars dropped because their symbol already had a bar at that timestamp.
    pub duplicates_dropped: usize,
}

impl LoadReport {
    pub fn rows_accepted(&self) -> usize {
        self.files.iter().map(|f| f.rows_accepted).sum()
    }

    pub fn rows_rejected(&self) -> usize {
        self.files.iter().map(|f| f.rows_rejected).sum()
    }

    pub fn truncated_files(&self) -> usize {
        self.files.iter().filter(|f| f.truncated).count()
    }

    pub(crate) fn skip(&mut self, path: &Path, issue: FileIssue) {
        tracing::warn!(file = %path.display(), %issue, "skipping file");
        self.skipped.push(SkippedFile {
            path: path.to_path_buf(),
            issue,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarStore {
    series: BTreeMap<String, Vec<PriceBar>>,
}

impl BarStore {
    /// Build a store from in-memory series. Each series is sorted and
    /// duplicate timestamps are dropped (first occurrence wins); empty
    /// series are discarded.
    pub fn from_series<I, S>(series: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<PriceBar>)>,
        S: Into<String>,
    {
        let mut store = Self::default();
        for (symbol, bars) in series {
            store.extend_symbol(symbol.into(), bars);
        }
        store.normalize();
        store
    }

    /// Load every `.csv` file in `dir`.
    pub fn load(dir: &Path, options: &LoadOptions) -> Result<(Self, LoadReport), DataError> {
        let paths = list_csv_files(dir)?;
        let mut report = LoadReport::default();
        let mut store = Self::default();

        for path in &paths {
            let Some(symbol) = options.resolver.resolve(path) else {
                report.skip(path, FileIssue::NoSymbol);
                continue;
            };
            let mut file = match BarFile::open(path, &symbol, options.max_rows_per_file) {
                Ok(f) => f,
                Err(issue) => {
                    report.skip(path, issue);
                    continue;
                }
            };

            let bars = file.read_rows(None);
            let stats = file.stats().clone();
            if stats.rows_rejected > 0 {
                tracing::warn!(
                    file = %path.display(),
                    %symbol,
                    rejected = stats.rows_rejected,
                    accepted = stats.rows_accepted,
                    "rejected malformed rows"
                );
            }
            if bars.is_empty() {
                tracing::warn!(file = %path.display(), %symbol, "file has no valid bars");
            }
            report.files.push(stats);
            store.extend_symbol(symbol, bars);
        }

        report.duplicates_dropped = store.normalize();

        if store.is_empty() {
            return Err(DataError::NoUsableData {
                path: dir.to_path_buf(),
            });
        }

        tracing::info!(
            dir = %dir.display(),
            symbols = store.len(),
            bars = store.total_bars(),
            skipped_files = report.skipped.len(),
            "loaded bar store"
        );
        Ok((store, report))
    }

    fn extend_symbol(&mut self, symbol: String, bars: Vec<PriceBar>) {
        self.series.entry(symbol).or_default().extend(bars);
    }

    /// Sort, dedup and drop empty series. Returns the number of duplicates.
    fn normalize(&mut self) -> usize {
        let mut dropped = 0;
        for (symbol, bars) in self.series.iter_mut() {
            bars.sort_by_key(|b| b.timestamp());
            let before = bars.len();
            bars.dedup_by_key(|b| b.timestamp());
            let removed = before - bars.len();
            if removed > 0 {
                tracing::debug!(%symbol, removed, "dropped duplicate timestamps");
            }
            dropped += removed;
        }
        self.series.retain(|_, bars| !bars.is_empty());
        dropped
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn total_bars(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn series(&self, symbol: &str) -> Option<&[PriceBar]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PriceBar])> {
        self.series.iter().map(|(s, b)| (s.as_str(), b.as_slice()))
    }

    /// Earliest first timestamp across all symbols.
    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.series
            .values()
            .filter_map(|b| b.first())
            .map(PriceBar::timestamp)
            .min()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.series
            .values()
            .filter_map(|b| b.last())
            .map(PriceBar::timestamp)
            .max()
    }

    /// Deterministic BLAKE3 content hash (hex).
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (symbol, bars) in &self.series {
            hasher.update(symbol.as_bytes());
            hasher.update(&[0]);
            for bar in bars {
                let ts = bar.timestamp().and_utc();
                hasher.update(&ts.timestamp().to_le_bytes());
                hasher.update(&ts.timestamp_subsec_nanos().to_le_bytes());
                hasher.update(&bar.open().to_le_bytes());
                hasher.update(&bar.high().to_le_bytes());
                hasher.update(&bar.low().to_le_bytes());
                hasher.update(&bar.close().to_le_bytes());
                hasher.update(&bar.volume().to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Regular `.csv` files (case-insensitive) directly inside `dir`, sorted.
pub(crate) fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, DataError> {
    if !dir.is_dir() {
        return Err(DataError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let read_dir = |source| DataError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir)? {
        let path = entry.map_err(read_dir)?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

//! Chunked replay straight from disk.
//!
//! Files stay open for the whole replay and are read `chunk_rows` raw rows at
//! a time. A chunk only releases bars up to its horizon, the earliest
//! last-loaded timestamp among files that still have rows; anything later is
//! carried into the next chunk. When a new chunk is built for a symbol, the
//! last `warmup_rows` bars it already emitted are placed in front of the new
//! series and the cursor starts after them, so lookback queries stay warm and
//! nothing is emitted twice.

use super::csv_source::BarFile;
use super::error::{DataError, FileIssue};
use super::source::{next_instant, SnapshotSource};
use super::store::{list_csv_files, LoadOptions, LoadReport};
use crate::domain::{DataSnapshot, PriceBar};
use crate::window::RollingWindow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Raw data rows read from each file per chunk (at least 1).
    pub chunk_rows: usize,
    /// Emitted bars kept per symbol and prepended to the next chunk.
    pub warmup_rows: usize,
    /// Rows consumed silently from the start of every file.
    pub start_row: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_rows: 10_000,
            warmup_rows: 0,
            start_row: 0,
        }
    }
}

struct StreamFile {
    file: BarFile,
    last_loaded: Option<NaiveDateTime>,
}

#[derive(Debug)]
struct SymbolStream {
    /// Most recently emitted bars, newest last.
    history: RollingWindow<PriceBar>,
    /// Loaded bars beyond the current horizon, tagged with their file index.
    carry: Vec<(usize, PriceBar)>,
    /// Warm-up prefix followed by this chunk's releasable bars.
    series: Vec<PriceBar>,
    cursor: usize,
    last_emitted: Option<NaiveDateTime>,
    dropped: usize,
}

impl SymbolStream {
    fn new(warmup_rows: usize) -> Self {
        Self {
            history: RollingWindow::new(warmup_rows),
            carry: Vec::new(),
            series: Vec::new(),
            cursor: 0,
            last_emitted: None,
            dropped: 0,
        }
    }

    fn head(&self) -> Option<&PriceBar> {
        self.series.get(self.cursor)
    }

    fn is_drained(&self) -> bool {
        self.cursor >= self.series.len()
    }

    fn record_emitted(&mut self, bar: PriceBar) {
        self.last_emitted = Some(bar.timestamp());
        self.history.push(bar);
    }

    /// Keep bars strictly after the last emitted one, sorted. On a shared
    /// timestamp the bar from the earliest file wins, as in a full load.
    fn accept_in_order(&mut self, mut bars: Vec<(usize, PriceBar)>) -> Vec<PriceBar> {
        bars.sort_by_key(|(file, bar)| (bar.timestamp(), *file));
        let before = bars.len();
        bars.dedup_by_key(|(_, bar)| bar.timestamp());
        if let Some(last) = self.last_emitted {
            bars.retain(|(_, bar)| bar.timestamp() > last);
        }
        self.dropped += before - bars.len();
        bars.into_iter().map(|(_, bar)| bar).collect()
    }
}

pub struct ChunkedReplayer {
    dir: PathBuf,
    options: StreamOptions,
    files: Vec<StreamFile>,
    symbols: BTreeMap<String, SymbolStream>,
    report: LoadReport,
    chunks_loaded: usize,
    now: NaiveDateTime,
}

impl ChunkedReplayer {
    /// Open every `.csv` file in `dir` and load the first chunk.
    pub fn open(
        dir: &Path,
        load: &LoadOptions,
        options: StreamOptions,
    ) -> Result<Self, DataError> {
        let options = StreamOptions {
            chunk_rows: options.chunk_rows.max(1),
            ..options
        };
        let mut report = LoadReport::default();
        let mut files = Vec::new();
        let mut symbols = BTreeMap::new();

        for path in list_csv_files(dir)? {
            let Some(symbol) = load.resolver.resolve(&path) else {
                report.skip(&path, FileIssue::NoSymbol);
                continue;
            };
            match BarFile::open(&path, &symbol, load.max_rows_per_file) {
                Ok(file) => {
                    symbols
                        .entry(symbol)
                        .or_insert_with(|| SymbolStream::new(options.warmup_rows));
                    files.push(StreamFile {
                        file,
                        last_loaded: None,
                    });
                }
                Err(issue) => report.skip(&path, issue),
            }
        }

        let mut replayer = Self {
            dir: dir.to_path_buf(),
            options,
            files,
            symbols,
            report,
            chunks_loaded: 0,
            now: NaiveDateTime::MIN,
        };
        replayer.skip_start_rows();
        replayer.load_chunk();

        let accepted: usize = replayer.files.iter().map(|f| f.file.stats().rows_accepted).sum();
        if accepted == 0 {
            return Err(DataError::NoUsableData {
                path: dir.to_path_buf(),
            });
        }

        replayer.now = replayer
            .pending_instant()
            .or_else(|| replayer.symbols.values().filter_map(|s| s.last_emitted).max())
            .ok_or_else(|| DataError::NoUsableData {
                path: dir.to_path_buf(),
            })?;

        tracing::info!(
            dir = %replayer.dir.display(),
            files = replayer.files.len(),
            symbols = replayer.symbols.len(),
            chunk_rows = replayer.options.chunk_rows,
            warmup_rows = replayer.options.warmup_rows,
            "opened chunked replay"
        );
        Ok(replayer)
    }

    pub fn options(&self) -> StreamOptions {
        self.options
    }

    pub fn chunks_loaded(&self) -> usize {
        self.chunks_loaded
    }

    /// Ingestion statistics so far; grows as chunks are read.
    pub fn report(&self) -> LoadReport {
        let mut report = self.report.clone();
        report.files = self.files.iter().map(|f| f.file.stats().clone()).collect();
        report.duplicates_dropped = self.symbols.values().map(|s| s.dropped).sum();
        report
    }

    pub fn is_finished(&self) -> bool {
        self.files.iter().all(|f| f.file.is_exhausted())
            && self.symbols.values().all(|s| s.is_drained() && s.carry.is_empty())
    }

    fn pending_instant(&self) -> Option<NaiveDateTime> {
        next_instant(self.symbols.values().map(|s| s.head().map(PriceBar::timestamp)))
    }

    fn skip_start_rows(&mut self) {
        if self.options.start_row == 0 {
            return;
        }
        let mut skipped: BTreeMap<String, Vec<(usize, PriceBar)>> = BTreeMap::new();
        for (index, stream) in self.files.iter_mut().enumerate() {
            let bars = stream.file.read_rows(Some(self.options.start_row));
            if let Some(last) = bars.last() {
                stream.last_loaded = Some(last.timestamp());
            }
            skipped
                .entry(stream.file.symbol().to_string())
                .or_default()
                .extend(bars.into_iter().map(|bar| (index, bar)));
        }
        for (symbol, bars) in skipped {
            if let Some(state) = self.symbols.get_mut(&symbol) {
                for bar in state.accept_in_order(bars) {
                    state.record_emitted(bar);
                }
            }
        }
        for state in self.symbols.values_mut() {
            state.series = state.history.last_n(self.options.warmup_rows).copied().collect();
            state.cursor = state.series.len();
        }
    }

    /// Read chunks until some symbol has releasable bars or every file is
    /// exhausted.
    fn load_chunk(&mut self) {
        loop {
            let any_open = self.files.iter().any(|f| !f.file.is_exhausted());
            let any_carry = self.symbols.values().any(|s| !s.carry.is_empty());
            if !any_open && !any_carry {
                return;
            }

            for (index, stream) in self.files.iter_mut().enumerate() {
                if stream.file.is_exhausted() {
                    continue;
                }
                let bars = stream.file.read_rows(Some(self.options.chunk_rows));
                if let Some(last) = bars.last() {
                    stream.last_loaded = Some(last.timestamp());
                }
                if let Some(state) = self.symbols.get_mut(stream.file.symbol()) {
                    state.carry.extend(bars.into_iter().map(|bar| (index, bar)));
                }
            }
            self.chunks_loaded += 1;

            // An open file that has produced nothing yet could still hold
            // bars earlier than anything loaded, so nothing is releasable.
            let open: Vec<&StreamFile> =
                self.files.iter().filter(|f| !f.file.is_exhausted()).collect();
            if open.iter().any(|f| f.last_loaded.is_none()) {
                continue;
            }
            let horizon = open.iter().filter_map(|f| f.last_loaded).min();

            let mut released = 0;
            for state in self.symbols.values_mut() {
                let carry = std::mem::take(&mut state.carry);
                let (ready, later): (Vec<_>, Vec<_>) = carry
                    .into_iter()
                    .partition(|(_, b)| horizon.map_or(true, |h| b.timestamp() <= h));
                state.carry = later;

                let ready = state.accept_in_order(ready);
                released += ready.len();

                let mut series: Vec<PriceBar> = state
                    .history
                    .last_n(self.options.warmup_rows)
                    .copied()
                    .collect();
                state.cursor = series.len();
                series.extend(ready);
                state.series = series;
            }

            tracing::debug!(
                chunk = self.chunks_loaded,
                released,
                horizon = ?horizon,
                "loaded chunk"
            );
            if released > 0 {
                return;
            }
        }
    }
}

impl SnapshotSource for ChunkedReplayer {
    fn next_snapshot(&mut self) -> Option<DataSnapshot> {
        let instant = match self.pending_instant() {
            Some(instant) => instant,
            None => {
                if self.is_finished() {
                    return None;
                }
                self.load_chunk();
                self.pending_instant()?
            }
        };

        let mut snapshot = DataSnapshot::new(instant);
        for (symbol, state) in &mut self.symbols {
            let Some(bar) = state.head().copied() else {
                continue;
            };
            if bar.timestamp() == instant {
                snapshot.insert(symbol.clone(), bar);
                state.cursor += 1;
                state.record_emitted(bar);
            }
        }

        self.now = instant;
        Some(snapshot)
    }

    fn current_time(&self) -> NaiveDateTime {
        self.now
    }

    fn symbols(&self) -> Vec<String> {
        self.symbols.keys().cloned().collect()
    }

    fn warmup_bars(&self, symbol: &str, lookback: usize) -> Vec<PriceBar> {
        self.symbols
            .get(symbol)
            .map(|s| s.series[s.cursor.saturating_sub(lookback)..s.cursor].to_vec())
            .unwrap_or_default()
    }
}

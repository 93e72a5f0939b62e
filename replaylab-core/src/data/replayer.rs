//! In-memory replay over a shared [`BarStore`].
//!
//! Each call to [`Replayer::next_snapshot`] finds the smallest pending
//! timestamp across symbols and advances only the symbols whose head bar
//! carries it. Symbols that trade later are left alone, so series with
//! different calendars interleave in true time order.

use super::error::DataError;
use super::source::{next_instant, SnapshotSource};
use super::store::BarStore;
use crate::domain::{DataSnapshot, PriceBar};
use chrono::NaiveDateTime;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Cursor {
    symbol: String,
    start: usize,
    pos: usize,
}

#[derive(Debug, Clone)]
pub struct Replayer {
    store: Arc<BarStore>,
    cursors: Vec<Cursor>,
    now: NaiveDateTime,
}

impl Replayer {
    pub fn new(store: Arc<BarStore>) -> Result<Self, DataError> {
        Self::with_start_row(store, 0)
    }

    /// Start every symbol `start_row` bars into its series. The skipped bars
    /// remain available through [`Replayer::warmup_bars`].
    pub fn with_start_row(store: Arc<BarStore>, start_row: usize) -> Result<Self, DataError> {
        let now = store.first_timestamp().ok_or(DataError::EmptyStore)?;
        let cursors = store
            .iter()
            .map(|(symbol, bars)| {
                let start = start_row.min(bars.len());
                Cursor {
                    symbol: symbol.to_string(),
                    start,
                    pos: start,
                }
            })
            .collect();
        let mut replayer = Self {
            store,
            cursors,
            now,
        };
        if let Some(first) = replayer.pending_instant() {
            replayer.now = first;
        }
        Ok(replayer)
    }

    pub fn store(&self) -> &Arc<BarStore> {
        &self.store
    }

    fn head(&self, cursor: &Cursor) -> Option<&PriceBar> {
        self.store
            .series(&cursor.symbol)
            .and_then(|bars| bars.get(cursor.pos))
    }

    fn pending_instant(&self) -> Option<NaiveDateTime> {
        next_instant(
            self.cursors
                .iter()
                .map(|c| self.head(c).map(PriceBar::timestamp)),
        )
    }

    pub fn is_finished(&self) -> bool {
        self.pending_instant().is_none()
    }

    /// Reset every cursor to its start offset.
    pub fn rewind(&mut self) {
        for cursor in &mut self.cursors {
            cursor.pos = cursor.start;
        }
        if let Some(first) = self.pending_instant() {
            self.now = first;
        }
    }

    /// Bars remaining across all symbols.
    pub fn remaining(&self) -> usize {
        self.cursors
            .iter()
            .map(|c| {
                self.store
                    .series(&c.symbol)
                    .map_or(0, |bars| bars.len() - c.pos)
            })
            .sum()
    }
}

impl SnapshotSource for Replayer {
    fn next_snapshot(&mut self) -> Option<DataSnapshot> {
        let instant = self.pending_instant()?;
        let store = Arc::clone(&self.store);
        let mut snapshot = DataSnapshot::new(instant);

        for cursor in &mut self.cursors {
            let Some(bar) = store
                .series(&cursor.symbol)
                .and_then(|bars| bars.get(cursor.pos))
            else {
                continue;
            };
            if bar.timestamp() == instant {
                snapshot.insert(cursor.symbol.clone(), *bar);
                cursor.pos += 1;
            }
        }

        self.now = instant;
        Some(snapshot)
    }

    fn current_time(&self) -> NaiveDateTime {
        self.now
    }

    fn symbols(&self) -> Vec<String> {
        self.cursors.iter().map(|c| c.symbol.clone()).collect()
    }

    fn warmup_bars(&self, symbol: &str, lookback: usize) -> Vec<PriceBar> {
        let Some(cursor) = self.cursors.iter().find(|c| c.symbol == symbol) else {
            return Vec::new();
        };
        self.store
            .series(symbol)
            .map(|bars| bars[cursor.pos.saturating_sub(lookback)..cursor.pos].to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, 0, sec)
            .unwrap()
    }

    fn bar(sec: u32, close: f64) -> PriceBar {
        PriceBar::new(t(sec), close, close + 1.0, close - 1.0, close, 10.0).unwrap()
    }

    fn store() -> Arc<BarStore> {
        Arc::new(BarStore::from_series([
            ("X", vec![bar(0, 10.0), bar(1, 11.0), bar(2, 12.0)]),
            ("Y", vec![bar(1, 50.0)]),
        ]))
    }

    #[test]
    fn empty_store_is_an_error() {
        let err = Replayer::new(Arc::new(BarStore::default())).unwrap_err();
        assert!(matches!(err, DataError::EmptyStore));
    }

    #[test]
    fn starts_at_earliest_timestamp() {
        let replayer = Replayer::new(store()).unwrap();
        assert_eq!(replayer.current_time(), t(0));
        assert_eq!(replayer.remaining(), 4);
    }

    #[test]
    fn only_matching_symbols_advance() {
        let mut replayer = Replayer::new(store()).unwrap();
        let first = replayer.next_snapshot().unwrap();
        assert_eq!(first.symbols().collect::<Vec<_>>(), vec!["X"]);

        let second = replayer.next_snapshot().unwrap();
        assert_eq!(second.timestamp(), t(1));
        assert_eq!(second.symbols().collect::<Vec<_>>(), vec!["X", "Y"]);

        let third = replayer.next_snapshot().unwrap();
        assert_eq!(third.symbols().collect::<Vec<_>>(), vec!["X"]);
        assert_eq!(replayer.current_time(), t(2));

        assert!(replayer.next_snapshot().is_none());
        assert!(replayer.is_finished());
    }

    #[test]
    fn rewind_replays_identically() {
        let mut replayer = Replayer::new(store()).unwrap();
        let first: Vec<_> = std::iter::from_fn(|| replayer.next_snapshot()).collect();
        replayer.rewind();
        let second: Vec<_> = std::iter::from_fn(|| replayer.next_snapshot()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn start_row_exposes_skipped_bars_as_warmup() {
        let mut replayer = Replayer::with_start_row(store(), 2).unwrap();
        assert_eq!(replayer.current_time(), t(2));
        let warm = replayer.warmup_bars("X", 5);
        assert_eq!(warm.len(), 2);
        assert_eq!(warm[1].close(), 11.0);
        assert_eq!(replayer.warmup_bars("Y", 5).len(), 1);

        let snap = replayer.next_snapshot().unwrap();
        assert_eq!(snap.timestamp(), t(2));
        assert!(replayer.next_snapshot().is_none());
    }

    #[test]
    fn warmup_bars_clamps_lookback() {
        let mut replayer = Replayer::new(store()).unwrap();
        replayer.next_snapshot();
        replayer.next_snapshot();
        let warm = replayer.warmup_bars("X", 1);
        assert_eq!(warm.len(), 1);
        assert_eq!(warm[0].close(), 11.0);
        assert!(replayer.warmup_bars("NOPE", 3).is_empty());
    }
}

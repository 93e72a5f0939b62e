use crate::domain::{DataSnapshot, PriceBar};
use chrono::NaiveDateTime;

/// A globally time-ordered stream of snapshots.
///
/// Implemented by the in-memory [`Replayer`](super::Replayer) and the
/// disk-streaming [`ChunkedReplayer`](super::ChunkedReplayer).
pub trait SnapshotSource {
    /// The next instant's bars, or `None` once every series is consumed.
    fn next_snapshot(&mut self) -> Option<DataSnapshot>;

    /// The instant of the most recent snapshot (before the first snapshot,
    /// the instant the replay will start at).
    fn current_time(&self) -> NaiveDateTime;

    /// Symbols known to this source, sorted.
    fn symbols(&self) -> Vec<String>;

    /// Up to `lookback` bars of `symbol` that precede its cursor, oldest first.
    fn warmup_bars(&self, symbol: &str, lookback: usize) -> Vec<PriceBar>;
}

/// Smallest of the pending head timestamps.
pub(crate) fn next_instant<I>(heads: I) -> Option<NaiveDateTime>
where
    I: IntoIterator<Item = Option<NaiveDateTime>>,
{
    heads.into_iter().flatten().min()
}

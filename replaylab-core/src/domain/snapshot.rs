//! DataSnapshot — all bars sharing one simulated instant.

use super::bar::PriceBar;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Bars of every symbol that printed at `timestamp`.
///
/// Symbols without a bar at this instant are simply absent; the snapshot
/// never carries forward stale bars.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSnapshot {
    timestamp: NaiveDateTime,
    bars: BTreeMap<String, PriceBar>,
}

impl DataSnapshot {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            bars: BTreeMap::new(),
        }
    }

    /// Add a bar. Returns `false` (and leaves the snapshot unchanged) if the
    /// bar belongs to a different instant.
    pub fn insert(&mut self, symbol: impl Into<String>, bar: PriceBar) -> bool {
        if bar.timestamp() != self.timestamp {
            return false;
        }
        self.bars.insert(symbol.into(), bar);
        true
    }

    /// Builder form of [`DataSnapshot::insert`]; mismatched bars are ignored.
    pub fn with_bar(mut self, symbol: impl Into<String>, bar: PriceBar) -> Self {
        self.insert(symbol, bar);
        self
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceBar> {
        self.bars.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.bars.contains_key(symbol)
    }

    /// Symbols in this snapshot, sorted.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PriceBar)> {
        self.bars.iter().map(|(s, b)| (s.as_str(), b))
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    #[test]
    fn rejects_bar_from_other_instant() {
        let bar = PriceBar::new(at(1), 10.0, 11.0, 9.0, 10.5, 100.0).unwrap();
        let mut snap = DataSnapshot::new(at(0));
        assert!(!snap.insert("X", bar));
        assert!(snap.is_empty());
    }

    #[test]
    fn iterates_in_symbol_order() {
        let bar = PriceBar::new(at(0), 10.0, 11.0, 9.0, 10.5, 100.0).unwrap();
        let snap = DataSnapshot::new(at(0))
            .with_bar("NVDA", bar)
            .with_bar("GOOG", bar)
            .with_bar("MSFT", bar);
        let symbols: Vec<&str> = snap.symbols().collect();
        assert_eq!(symbols, vec!["GOOG", "MSFT", "NVDA"]);
        assert!(snap.contains("MSFT"));
    }
}

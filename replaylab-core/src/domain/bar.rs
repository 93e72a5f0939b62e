//! PriceBar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a row cannot become a [`PriceBar`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("non-finite value in OHLCV")]
    NonFinite,

    #[error("non-positive price (O={open}, H={high}, L={low}, C={close})")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("negative volume {0}")]
    NegativeVolume(f64),

    #[error("high {high} < low {low}")]
    HighBelowLow { high: f64, low: f64 },

    #[error("open/close outside high/low range (O={open}, H={high}, L={low}, C={close})")]
    OutsideRange {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV bar for a single symbol over one interval.
///
/// Fields are private: the only way to obtain a bar is [`PriceBar::new`],
/// which enforces the OHLC invariants. Bars are never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    timestamp: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl PriceBar {
    /// Validate and build a bar.
    ///
    /// Invariants: all prices finite and > 0, volume finite and >= 0,
    /// `high >= low`, `low <= min(open, close)`, `high >= max(open, close)`.
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarError> {
        if [open, high, low, close, volume].iter().any(|v| !v.is_finite()) {
            return Err(BarError::NonFinite);
        }
        if open <= 0.0 || high <= 0.0 || low <= 0.0 || close <= 0.0 {
            return Err(BarError::NonPositivePrice {
                open,
                high,
                low,
                close,
            });
        }
        if volume < 0.0 {
            return Err(BarError::NegativeVolume(volume));
        }
        if high < low {
            return Err(BarError::HighBelowLow { high, low });
        }
        if low > open.min(close) || high < open.max(close) {
            return Err(BarError::OutsideRange {
                open,
                high,
                low,
                close,
            });
        }
        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Basic OHLCV sanity check. Always true for bars built through [`PriceBar::new`];
    /// deserialized bars can be re-checked with this.
    pub fn is_sane(&self) -> bool {
        Self::new(
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
        .is_ok()
    }
}

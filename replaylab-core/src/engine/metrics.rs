//! Pure performance metrics over an equity curve.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One point of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// End-of-run figures for one strategy on one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub final_equity: f64,
    pub total_return_pct: f64,
    /// Largest peak-to-trough decline, as a positive percentage.
    pub max_drawdown_pct: f64,
    pub realized_pnl: f64,
    pub total_commission: f64,
    pub fill_count: usize,
}

/// `(final - initial) / initial * 100`, zero when `initial` is not positive.
pub fn total_return_pct(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity - initial) / initial * 100.0
}

/// Drawdown of `equity` below `peak`, as a positive percentage.
pub fn drawdown_pct(peak: f64, equity: f64) -> f64 {
    if peak <= 0.0 || equity >= peak {
        return 0.0;
    }
    (peak - equity) / peak * 100.0
}

/// Largest peak-to-trough decline over the curve, as a positive percentage.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        max_dd = max_dd.max(drawdown_pct(peak, eq));
    }
    max_dd
}

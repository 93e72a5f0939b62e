use replaylab_core::domain::DataSnapshot;
use replaylab_core::engine::{Strategy, StrategyContext, StrategyError};
use replaylab_core::RollingWindow;

const MIN_ORDER: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairState {
    Flat,
    ShortALongB,
    LongAShortB,
}

/// Mean-reversion on the price ratio of two symbols.
///
/// Tracks `a / b` over a rolling window and enters when the z-score leaves
/// `±entry_z`, exiting once it comes back inside `±exit_z`. Each leg is sized
/// to `trade_value` at the current close.
#[derive(Debug, Clone)]
pub struct PairsTrading {
    name: String,
    symbol_a: String,
    symbol_b: String,
    entry_z: f64,
    exit_z: f64,
    trade_value: f64,
    ratios: RollingWindow<f64>,
    sum: f64,
    sum_sq: f64,
    state: PairState,
}

impl PairsTrading {
    pub fn new(
        name: impl Into<String>,
        symbol_a: impl Into<String>,
        symbol_b: impl Into<String>,
        lookback: usize,
        entry_z: f64,
        exit_z: f64,
        trade_value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            symbol_a: symbol_a.into(),
            symbol_b: symbol_b.into(),
            entry_z,
            exit_z,
            trade_value,
            ratios: RollingWindow::new(lookback.max(2)),
            sum: 0.0,
            sum_sq: 0.0,
            state: PairState::Flat,
        }
    }

    fn push_ratio(&mut self, ratio: f64) {
        if let Some(evicted) = self.ratios.push(ratio) {
            self.sum -= evicted;
            self.sum_sq -= evicted * evicted;
        }
        self.sum += ratio;
        self.sum_sq += ratio * ratio;
    }

    /// Z-score of the newest ratio, once the window is full.
    fn z_score(&self, ratio: f64) -> Option<f64> {
        if !self.ratios.is_full() {
            return None;
        }
        let n = self.ratios.len() as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq - n * mean * mean) / (n - 1.0);
        if variance <= 0.0 {
            return None;
        }
        Some((ratio - mean) / variance.sqrt())
    }

    fn next_state(&self, z: f64) -> PairState {
        match self.state {
            PairState::Flat if z > self.entry_z => PairState::ShortALongB,
            PairState::Flat if z < -self.entry_z => PairState::LongAShortB,
            PairState::ShortALongB if z < self.exit_z => PairState::Flat,
            PairState::LongAShortB if z > -self.exit_z => PairState::Flat,
            current => current,
        }
    }

    fn rebalance(ctx: &mut StrategyContext<'_>, symbol: &str, target: f64) {
        let delta = target - ctx.position(symbol);
        if delta > MIN_ORDER {
            ctx.buy(symbol, delta);
        } else if delta < -MIN_ORDER {
            ctx.sell(symbol, -delta);
        }
    }
}

impl Strategy for PairsTrading {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_market(
        &mut self,
        snapshot: &DataSnapshot,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), StrategyError> {
        let (Some(a), Some(b)) = (snapshot.get(&self.symbol_a), snapshot.get(&self.symbol_b))
        else {
            return Ok(());
        };
        let (price_a, price_b) = (a.close(), b.close());
        let ratio = price_a / price_b;
        self.push_ratio(ratio);

        let Some(z) = self.z_score(ratio) else {
            return Ok(());
        };
        let next = self.next_state(z);
        if next == self.state {
            return Ok(());
        }
        tracing::debug!(strategy = %self.name, z, from = ?self.state, to = ?next, "pair transition");
        self.state = next;

        let (units_a, units_b) = (self.trade_value / price_a, self.trade_value / price_b);
        let (target_a, target_b) = match next {
            PairState::Flat => (0.0, 0.0),
            PairState::ShortALongB => (-units_a, units_b),
            PairState::LongAShortB => (units_a, -units_b),
        };
        let (symbol_a, symbol_b) = (self.symbol_a.clone(), self.symbol_b.clone());
        Self::rebalance(ctx, &symbol_a, target_a);
        Self::rebalance(ctx, &symbol_b, target_b);
        Ok(())
    }
}

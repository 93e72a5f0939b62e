use replaylab_core::domain::{DataSnapshot, PriceBar};
use replaylab_core::engine::{Strategy, StrategyContext, StrategyError};
use replaylab_core::RollingWindow;
use std::collections::HashMap;

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Long,
    Short,
    Flat,
}

#[derive(Debug, Clone)]
struct SymbolState {
    closes: RollingWindow<f64>,
    signal: Signal,
}

/// Simple moving-average crossover, long above and short below.
///
/// Targets `+quantity` when the short SMA is above the long SMA, `-quantity`
/// when below, and flat when they agree within tolerance. Orders are only
/// sent when the signal changes.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    name: String,
    short_window: usize,
    long_window: usize,
    quantity: f64,
    states: HashMap<String, SymbolState>,
}

impl MaCrossover {
    pub fn new(name: impl Into<String>, short_window: usize, long_window: usize, quantity: f64) -> Self {
        Self {
            name: name.into(),
            short_window,
            long_window,
            quantity,
            states: HashMap::new(),
        }
    }

    fn state(&mut self, symbol: &str) -> &mut SymbolState {
        let capacity = self.long_window;
        self.states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState {
                closes: RollingWindow::new(capacity),
                signal: Signal::Flat,
            })
    }

    fn desired(&self, closes: &RollingWindow<f64>) -> Option<Signal> {
        let short = closes.mean_last(self.short_window)?;
        let long = closes.mean_last(self.long_window)?;
        Some(if short > long + TOLERANCE {
            Signal::Long
        } else if short < long - TOLERANCE {
            Signal::Short
        } else {
            Signal::Flat
        })
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    /// Seed the price windows so signals are live from the first instant.
    fn on_warmup(&mut self, symbol: &str, bars: &[PriceBar]) {
        let state = self.state(symbol);
        for bar in bars {
            state.closes.push(bar.close());
        }
    }

    fn on_market(
        &mut self,
        snapshot: &DataSnapshot,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), StrategyError> {
        for (symbol, bar) in snapshot.iter() {
            self.state(symbol).closes.push(bar.close());
            let Some(state) = self.states.get(symbol) else {
                continue;
            };
            let Some(desired) = self.desired(&state.closes) else {
                continue;
            };
            if desired == state.signal {
                continue;
            }

            let target = match desired {
                Signal::Long => self.quantity,
                Signal::Short => -self.quantity,
                Signal::Flat => 0.0,
            };
            let delta = target - ctx.position(symbol);
            tracing::debug!(
                strategy = %self.name,
                %symbol,
                signal = ?desired,
                delta,
                "crossover"
            );
            if delta > TOLERANCE {
                ctx.buy(symbol, delta);
            } else if delta < -TOLERANCE {
                ctx.sell(symbol, -delta);
            }
            self.state(symbol).signal = desired;
        }
        Ok(())
    }
}

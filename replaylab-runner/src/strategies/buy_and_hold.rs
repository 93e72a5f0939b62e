use replaylab_core::domain::DataSnapshot;
use replaylab_core::engine::{Strategy, StrategyContext, StrategyError};
use std::collections::HashSet;

/// Buys each symbol once, the first time it prints, and never sells.
///
/// Each new symbol gets `allocation` of the cash not already committed to
/// orders waiting for the next instant.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    name: String,
    allocation: f64,
    bought: HashSet<String>,
}

impl BuyAndHold {
    pub const MIN_QUANTITY: f64 = 0.01;

    pub fn new(name: impl Into<String>, allocation: f64) -> Self {
        Self {
            name: name.into(),
            allocation,
            bought: HashSet::new(),
        }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_market(
        &mut self,
        snapshot: &DataSnapshot,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), StrategyError> {
        let mut available = ctx.cash();
        for (symbol, bar) in snapshot.iter() {
            if self.bought.contains(symbol) {
                continue;
            }
            let budget = available * self.allocation;
            let quantity = budget / bar.close();
            if quantity > Self::MIN_QUANTITY {
                ctx.buy(symbol, quantity);
                available -= budget;
                self.bought.insert(symbol.to_string());
            }
        }
        Ok(())
    }
}

//! Strategy trait and the per-callback context handed to strategies.

use super::ledger::Ledger;
use crate::domain::{DataSnapshot, Fill, OrderIntent, OrderSide, PriceBar};
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("invalid strategy parameter: {0}")]
    InvalidParameter(String),

    #[error("strategy {name} failed: {message}")]
    Failed { name: String, message: String },
}

/// Read-only view of the run plus an order outbox.
///
/// Orders submitted here are stamped with the current instant and are never
/// filled against a bar at that instant.
pub struct StrategyContext<'a> {
    now: NaiveDateTime,
    ledger: &'a Ledger,
    orders: Vec<OrderIntent>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(now: NaiveDateTime, ledger: &'a Ledger) -> Self {
        Self {
            now,
            ledger,
            orders: Vec::new(),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    pub fn cash(&self) -> f64 {
        self.ledger.cash()
    }

    pub fn equity(&self) -> f64 {
        self.ledger.equity()
    }

    /// Signed quantity held in `symbol`.
    pub fn position(&self, symbol: &str) -> f64 {
        self.ledger.position_quantity(symbol)
    }

    pub fn buy(&mut self, symbol: &str, quantity: f64) {
        self.orders
            .push(OrderIntent::market(self.now, symbol, OrderSide::Buy, quantity));
    }

    pub fn sell(&mut self, symbol: &str, quantity: f64) {
        self.orders
            .push(OrderIntent::market(self.now, symbol, OrderSide::Sell, quantity));
    }

    /// Submit an arbitrary intent; its timestamp is overwritten with now.
    pub fn submit(&mut self, mut order: OrderIntent) {
        order.timestamp = self.now;
        self.orders.push(order);
    }

    pub fn pending(&self) -> &[OrderIntent] {
        &self.orders
    }

    pub fn into_orders(self) -> Vec<OrderIntent> {
        self.orders
    }
}

/// Trading logic driven by the orchestrator.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// History preceding the first replayed bar of `symbol`.
    fn on_warmup(&mut self, _symbol: &str, _bars: &[PriceBar]) {}

    fn on_market(
        &mut self,
        snapshot: &DataSnapshot,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), StrategyError>;

    fn on_fill(&mut self, _fill: &Fill, _ctx: &mut StrategyContext<'_>) -> Result<(), StrategyError> {
        Ok(())
    }
}

//! Ledger: cash, positions, realized PnL and the equity curve for one run.
//!
//! Positions use weighted-average cost. A reducing fill realizes PnL on the
//! closed portion; a fill that crosses zero closes the old position and opens
//! the remainder at the fill price.

use super::metrics::{drawdown_pct, total_return_pct, EquitySample, RunSummary};
use crate::domain::{DataSnapshot, Fill, OrderSide, Position, QUANTITY_EPSILON};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("fill price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("fill quantity must be non-negative and finite, got {0}")]
    InvalidQuantity(f64),

    #[error("commission must be non-negative and finite, got {0}")]
    InvalidCommission(f64),
}

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_cash: f64,
    cash: f64,
    positions: BTreeMap<String, Position>,
    marks: HashMap<String, f64>,
    realized_pnl: f64,
    total_commission: f64,
    buy_cost: f64,
    sell_proceeds: f64,
    fill_count: usize,
    equity_curve: Vec<EquitySample>,
    peak: f64,
    max_drawdown_pct: f64,
}

impl Ledger {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            marks: HashMap::new(),
            realized_pnl: 0.0,
            total_commission: 0.0,
            buy_cost: 0.0,
            sell_proceeds: 0.0,
            fill_count: 0,
            equity_curve: Vec::new(),
            peak: initial_cash,
            max_drawdown_pct: 0.0,
        }
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn buy_cost(&self) -> f64 {
        self.buy_cost
    }

    pub fn sell_proceeds(&self) -> f64 {
        self.sell_proceeds
    }

    pub fn fill_count(&self) -> usize {
        self.fill_count
    }

    /// Open (non-flat) positions, sorted by symbol.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Signed quantity held, zero when flat.
    pub fn position_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.marks.get(symbol).copied()
    }

    pub fn equity_curve(&self) -> &[EquitySample] {
        &self.equity_curve
    }

    /// Apply a fill. Invalid fills are rejected and leave the ledger unchanged.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<(), LedgerError> {
        if !fill.price.is_finite() || fill.price <= 0.0 {
            return Err(LedgerError::InvalidPrice(fill.price));
        }
        if !fill.quantity.is_finite() || fill.quantity < 0.0 {
            return Err(LedgerError::InvalidQuantity(fill.quantity));
        }
        if !fill.commission.is_finite() || fill.commission < 0.0 {
            return Err(LedgerError::InvalidCommission(fill.commission));
        }

        let notional = fill.notional();
        match fill.side {
            OrderSide::Buy => self.buy_cost += notional,
            OrderSide::Sell => self.sell_proceeds += notional,
        }
        self.cash += fill.cash_flow();
        self.total_commission += fill.commission;
        self.fill_count += 1;

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::flat(fill.symbol.clone()));
        self.realized_pnl += update_position(position, fill.signed_quantity(), fill.price);
        if position.is_flat() {
            self.positions.remove(&fill.symbol);
        }
        Ok(())
    }

    /// Record the closing prices in `snapshot` as marks.
    pub fn mark(&mut self, snapshot: &DataSnapshot) {
        for (symbol, bar) in snapshot.iter() {
            self.marks.insert(symbol.to_string(), bar.close());
        }
    }

    /// Cash plus positions at their marks (average cost if never marked).
    pub fn equity(&self) -> f64 {
        let held: f64 = self
            .positions
            .values()
            .map(|p| {
                let price = self.mark_price(&p.symbol).unwrap_or(p.avg_cost);
                p.market_value(price)
            })
            .sum();
        self.cash + held
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions
            .values()
            .map(|p| p.unrealized_pnl(self.mark_price(&p.symbol).unwrap_or(p.avg_cost)))
            .sum()
    }

    /// Append an equity sample and update the running drawdown.
    pub fn record_equity(&mut self, timestamp: NaiveDateTime) {
        let equity = self.equity();
        self.peak = self.peak.max(equity);
        self.max_drawdown_pct = self.max_drawdown_pct.max(drawdown_pct(self.peak, equity));
        self.equity_curve.push(EquitySample { timestamp, equity });
    }

    /// `cash - (initial - buy_cost + sell_proceeds - commission)`; zero up to
    /// float rounding.
    pub fn conservation_gap(&self) -> f64 {
        self.cash
            - (self.initial_cash - self.buy_cost + self.sell_proceeds - self.total_commission)
    }

    pub fn summary(&self) -> RunSummary {
        let final_equity = self.equity();
        RunSummary {
            final_equity,
            total_return_pct: total_return_pct(self.initial_cash, final_equity),
            max_drawdown_pct: self.max_drawdown_pct,
            realized_pnl: self.realized_pnl,
            total_commission: self.total_commission,
            fill_count: self.fill_count,
        }
    }
}

/// Move `position` by `delta` at `price`; returns the realized PnL.
fn update_position(position: &mut Position, delta: f64, price: f64) -> f64 {
    let before = position.quantity;

    if position.is_flat() {
        position.quantity = delta;
        position.avg_cost = price;
        return 0.0;
    }

    if before.signum() == delta.signum() {
        let (q0, dq) = (before.abs(), delta.abs());
        position.avg_cost = (q0 * position.avg_cost + dq * price) / (q0 + dq);
        position.quantity = before + delta;
        return 0.0;
    }

    let closed = delta.abs().min(before.abs());
    let realized = closed * (price - position.avg_cost) * before.signum();
    position.quantity = before + delta;

    if position.quantity.abs() <= QUANTITY_EPSILON {
        position.quantity = 0.0;
        position.avg_cost = 0.0;
    } else if position.quantity.signum() != before.signum() {
        position.avg_cost = price;
    }
    realized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceBar;
    use chrono::NaiveDate;

    fn t(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(9, 30, sec)
            .unwrap()
    }

    fn fill(side: OrderSide, qty: f64, price: f64, commission: f64) -> Fill {
        Fill {
            timestamp: t(0),
            symbol: "X".into(),
            side,
            quantity: qty,
            price,
            commission,
        }
    }

    #[test]
    fn round_trip_books_realized_pnl() {
        let mut ledger = Ledger::new(10_000.0);
        ledger.apply_fill(&fill(OrderSide::Buy, 5.0, 100.0, 1.0)).unwrap();
        ledger.apply_fill(&fill(OrderSide::Sell, 5.0, 110.0, 1.0)).unwrap();
        assert!((ledger.realized_pnl() - 50.0).abs() < 1e-9);
        assert!((ledger.cash() - 10_048.0).abs() < 1e-9);
        assert!(ledger.position("X").is_none());
        assert!(ledger.conservation_gap().abs() < 1e-9);
    }

    #[test]
    fn adding_to_a_position_averages_cost() {
        let mut ledger = Ledger::new(10_000.0);
        ledger.apply_fill(&fill(OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        ledger.apply_fill(&fill(OrderSide::Buy, 10.0, 110.0, 0.0)).unwrap();
        let pos = ledger.position("X").unwrap();
        assert_eq!(pos.quantity, 20.0);
        assert!((pos.avg_cost - 105.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_zero_reopens_at_fill_price() {
        let mut ledger = Ledger::new(10_000.0);
        ledger.apply_fill(&fill(OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        ledger.apply_fill(&fill(OrderSide::Sell, 15.0, 90.0, 0.0)).unwrap();
        let pos = ledger.position("X").unwrap();
        assert_eq!(pos.quantity, -5.0);
        assert_eq!(pos.avg_cost, 90.0);
        assert!((ledger.realized_pnl() + 100.0).abs() < 1e-9);
    }

    #[test]
    fn short_cover_realizes_gain() {
        let mut ledger = Ledger::new(10_000.0);
        ledger.apply_fill(&fill(OrderSide::Sell, 10.0, 100.0, 0.0)).unwrap();
        ledger.apply_fill(&fill(OrderSide::Buy, 4.0, 80.0, 0.0)).unwrap();
        assert!((ledger.realized_pnl() - 80.0).abs() < 1e-9);
        let pos = ledger.position("X").unwrap();
        assert_eq!(pos.quantity, -6.0);
        assert_eq!(pos.avg_cost, 100.0);
    }

    #[test]
    fn invalid_fills_leave_ledger_untouched() {
        let mut ledger = Ledger::new(1_000.0);
        for bad in [
            fill(OrderSide::Buy, 1.0, 0.0, 1.0),
            fill(OrderSide::Buy, 1.0, f64::INFINITY, 1.0),
            fill(OrderSide::Buy, -1.0, 10.0, 1.0),
            fill(OrderSide::Buy, 1.0, 10.0, -1.0),
        ] {
            assert!(ledger.apply_fill(&bad).is_err());
        }
        assert_eq!(ledger.cash(), 1_000.0);
        assert_eq!(ledger.fill_count(), 0);
        assert!(ledger.position("X").is_none());
    }

    #[test]
    fn equity_uses_marks_then_cost_basis() {
        let mut ledger = Ledger::new(1_000.0);
        ledger.apply_fill(&fill(OrderSide::Buy, 2.0, 100.0, 0.0)).unwrap();
        assert_eq!(ledger.equity(), 1_000.0);

        let bar = PriceBar::new(t(1), 120.0, 120.0, 120.0, 120.0, 1.0).unwrap();
        ledger.mark(&DataSnapshot::new(t(1)).with_bar("X", bar));
        assert_eq!(ledger.equity(), 1_040.0);
        assert_eq!(ledger.unrealized_pnl(), 40.0);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let mut ledger = Ledger::new(1_000.0);
        ledger.apply_fill(&fill(OrderSide::Buy, 10.0, 100.0, 0.0)).unwrap();
        for (sec, close) in [(1, 110.0), (2, 88.0), (3, 120.0)] {
            let bar = PriceBar::new(t(sec), close, close, close, close, 1.0).unwrap();
            ledger.mark(&DataSnapshot::new(t(sec)).with_bar("X", bar));
            ledger.record_equity(t(sec));
        }
        // peak 1100, trough 880
        assert!((ledger.summary().max_drawdown_pct - 20.0).abs() < 1e-9);
        assert_eq!(ledger.equity_curve().len(), 3);
    }

    #[test]
    fn summary_is_idempotent() {
        let mut ledger = Ledger::new(1_000.0);
        ledger.apply_fill(&fill(OrderSide::Buy, 1.0, 10.0, 1.0)).unwrap();
        ledger.record_equity(t(0));
        assert_eq!(ledger.summary(), ledger.summary());
    }
}

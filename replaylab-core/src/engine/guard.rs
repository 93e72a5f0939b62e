//! Order rejection records and the pre-trade cash floor.

use super::simulator::CommissionModel;
use crate::domain::{OrderIntent, OrderSide};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Why an order never reached the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    UnsupportedOrderType,
    InvalidQuantity,
    NoPrice,
    CashFloor,
    InvalidFill,
    /// Still pending when the data ran out.
    Expired,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::UnsupportedOrderType => write!(f, "UnsupportedOrderType"),
            RejectionReason::InvalidQuantity => write!(f, "InvalidQuantity"),
            RejectionReason::NoPrice => write!(f, "NoPrice"),
            RejectionReason::CashFloor => write!(f, "CashFloor"),
            RejectionReason::InvalidFill => write!(f, "InvalidFill"),
            RejectionReason::Expired => write!(f, "Expired"),
        }
    }
}

/// A dropped order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOrder {
    /// Instant at which the order was dropped.
    pub timestamp: NaiveDateTime,
    pub order: OrderIntent,
    pub reason: RejectionReason,
    pub context: String,
}

/// Minimum cash the run must keep after any order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFloor {
    pub floor: f64,
}

impl CashFloor {
    pub fn new(floor: f64) -> Self {
        Self { floor }
    }

    /// Estimated cash after `order` fills at `reference_price`.
    pub fn projected_cash(
        order: &OrderIntent,
        reference_price: f64,
        cash: f64,
        commission: &CommissionModel,
    ) -> f64 {
        let notional = order.quantity * reference_price;
        let fee = commission.commission(order.quantity);
        match order.side {
            OrderSide::Buy => cash - notional - fee,
            OrderSide::Sell => cash + notional - fee,
        }
    }

    /// `Some(context)` when the order would breach the floor. Orders without
    /// a reference price are let through.
    pub fn evaluate(
        &self,
        order: &OrderIntent,
        reference_price: Option<f64>,
        cash: f64,
        commission: &CommissionModel,
    ) -> Option<String> {
        let price = reference_price?;
        let projected = Self::projected_cash(order, price, cash, commission);
        (projected < self.floor).then(|| {
            format!(
                "projected cash {projected:.2} below floor {:.2} ({} {} {} @ {price:.4})",
                self.floor, order.side, order.quantity, order.symbol
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(side: OrderSide, qty: f64) -> OrderIntent {
        OrderIntent::market(NaiveDateTime::MIN, "X", side, qty)
    }

    #[test]
    fn rejects_buy_that_breaches_floor() {
        let guard = CashFloor::new(2_000.0);
        let free = CommissionModel::free();
        assert!(guard
            .evaluate(&order(OrderSide::Buy, 7.0), Some(100.0), 2_500.0, &free)
            .is_some());
        assert!(guard
            .evaluate(&order(OrderSide::Buy, 4.0), Some(100.0), 2_500.0, &free)
            .is_none());
    }

    #[test]
    fn commission_counts_against_the_floor() {
        let guard = CashFloor::new(2_000.0);
        let model = CommissionModel::default();
        // 2500 - 500 - 1 = 1999
        assert!(guard
            .evaluate(&order(OrderSide::Buy, 5.0), Some(100.0), 2_500.0, &model)
            .is_some());
    }

    #[test]
    fn sells_raise_cash() {
        let guard = CashFloor::new(2_000.0);
        let model = CommissionModel::default();
        assert!(guard
            .evaluate(&order(OrderSide::Sell, 10.0), Some(100.0), 1_500.0, &model)
            .is_none());
    }

    #[test]
    fn unknown_price_passes() {
        let guard = CashFloor::new(1e9);
        assert!(guard
            .evaluate(&order(OrderSide::Buy, 1.0), None, 0.0, &CommissionModel::default())
            .is_none());
    }
}

//! Order intents emitted by strategies.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an order or fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1.0 for buys, -1.0 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    /// Side that moves a signed position by `delta`.
    pub fn for_delta(delta: f64) -> Self {
        if delta >= 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// What kind of order and its price parameters.
///
/// Only `Market` is executable; `Limit` exists so that it can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    /// Fill at the next snapshot's open (or the last known price).
    Market,
    /// Fill at limit price or better. Not simulated.
    Limit { limit_price: f64 },
}

/// A request to trade, created by a strategy and consumed exactly once by
/// the execution simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    /// Instant of the snapshot that produced this order.
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: f64,
}

impl OrderIntent {
    pub fn market(
        timestamp: NaiveDateTime,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: f64,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            order_type: OrderType::Market,
            side,
            quantity,
        }
    }

    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn side_from_delta() {
        assert_eq!(OrderSide::for_delta(3.0), OrderSide::Buy);
        assert_eq!(OrderSide::for_delta(-0.5), OrderSide::Sell);
    }

    #[test]
    fn signed_quantity_follows_side() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let order = OrderIntent::market(ts, "MSFT", OrderSide::Sell, 4.0);
        assert_eq!(order.signed_quantity(), -4.0);
        assert_eq!(order.order_type, OrderType::Market);
    }
}

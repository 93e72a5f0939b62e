use crate::domain::order::OrderSide;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Fill record: the simulated execution of one order intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
}

impl Fill {
    /// Gross traded value, unsigned.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }

    /// Cash impact including commission: negative for buys, positive for sells
    /// (commission always reduces cash).
    pub fn cash_flow(&self) -> f64 {
        -self.side.sign() * self.notional() - self.commission
    }
}

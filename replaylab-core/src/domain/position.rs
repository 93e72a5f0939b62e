use serde::{Deserialize, Serialize};

/// Quantities closer to zero than this are treated as flat.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Per-symbol holding. Quantity is signed: negative means short.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_cost: f64,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: 0.0,
            avg_cost: 0.0,
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > QUANTITY_EPSILON
    }

    pub fn is_short(&self) -> bool {
        self.quantity < -QUANTITY_EPSILON
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.abs() <= QUANTITY_EPSILON
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity * (current_price - self.avg_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_position_values() {
        let pos = Position {
            symbol: "ETH".into(),
            quantity: -2.0,
            avg_cost: 100.0,
        };
        assert!(pos.is_short());
        assert_eq!(pos.market_value(90.0), -180.0);
        assert_eq!(pos.unrealized_pnl(90.0), 20.0);
    }

    #[test]
    fn dust_is_flat() {
        let mut pos = Position::flat("BTC");
        pos.quantity = 1e-12;
        assert!(pos.is_flat());
    }
}

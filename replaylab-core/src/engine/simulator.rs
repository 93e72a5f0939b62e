//! Execution simulator: turns one order intent into one fill.
//!
//! Market orders fill at the opening price of the snapshot after the one that
//! produced them. If the symbol did not print in that snapshot, the last
//! known price is used instead; with no price at all the order cannot fill.

use crate::domain::{DataSnapshot, Fill, OrderIntent, OrderType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Per-unit commission with a per-order minimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionModel {
    pub per_unit: f64,
    pub minimum: f64,
}

impl Default for CommissionModel {
    fn default() -> Self {
        Self {
            per_unit: 0.005,
            minimum: 1.0,
        }
    }
}

impl CommissionModel {
    pub fn free() -> Self {
        Self {
            per_unit: 0.0,
            minimum: 0.0,
        }
    }

    /// `max(minimum, per_unit * |quantity|)`
    pub fn commission(&self, quantity: f64) -> f64 {
        (self.per_unit * quantity.abs()).max(self.minimum)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("unsupported order type {0:?}, only market orders execute")]
    UnsupportedOrderType(OrderType),

    #[error("invalid order quantity {0}")]
    InvalidQuantity(f64),

    #[error("no reference price for {symbol}")]
    NoReferencePrice { symbol: String },
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionSimulator {
    commission: CommissionModel,
    last_prices: HashMap<String, f64>,
}

impl ExecutionSimulator {
    pub fn new(commission: CommissionModel) -> Self {
        Self {
            commission,
            last_prices: HashMap::new(),
        }
    }

    pub fn commission_model(&self) -> &CommissionModel {
        &self.commission
    }

    /// Refresh the last-known-price cache from a snapshot's closes.
    pub fn observe(&mut self, snapshot: &DataSnapshot) {
        for (symbol, bar) in snapshot.iter() {
            self.last_prices.insert(symbol.to_string(), bar.close());
        }
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    /// Fill `order` against `reference`, the snapshot following the order's.
    pub fn execute(
        &mut self,
        order: &OrderIntent,
        reference: &DataSnapshot,
    ) -> Result<Fill, ExecutionError> {
        if order.order_type != OrderType::Market {
            return Err(ExecutionError::UnsupportedOrderType(order.order_type));
        }
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return Err(ExecutionError::InvalidQuantity(order.quantity));
        }

        let price = match reference.get(&order.symbol) {
            Some(bar) => {
                self.last_prices.insert(order.symbol.clone(), bar.open());
                bar.open()
            }
            None => self
                .last_price(&order.symbol)
                .ok_or_else(|| ExecutionError::NoReferencePrice {
                    symbol: order.symbol.clone(),
                })?,
        };

        Ok(Fill {
            timestamp: reference.timestamp(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
            commission: self.commission.commission(order.quantity),
        })
    }
}

//! Reference strategies and their serializable specs.
//!
//! A `StrategySpec` is what a batch config names; `build()` validates the
//! parameters and produces a fresh trait object for one run.

mod buy_and_hold;
mod ma_crossover;
mod pairs;

pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::MaCrossover;
pub use pairs::PairsTrading;

use replaylab_core::engine::{Strategy, StrategyError};
use serde::{Deserialize, Serialize};

fn default_allocation() -> f64 {
    0.95
}

fn default_lookback() -> usize {
    30
}

fn default_entry_z() -> f64 {
    2.0
}

fn default_exit_z() -> f64 {
    0.5
}

fn default_trade_value() -> f64 {
    10_000.0
}

/// Strategy parameters (serializable enum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategySpec {
    /// Buy every symbol once and hold to the end.
    BuyAndHold {
        #[serde(default = "default_allocation")]
        allocation: f64,
    },

    /// Short SMA against long SMA, fixed quantity per signal.
    MaCrossover {
        short_window: usize,
        long_window: usize,
        quantity: f64,
    },

    /// Ratio z-score mean reversion between two symbols.
    PairsTrading {
        symbol_a: String,
        symbol_b: String,
        #[serde(default = "default_lookback")]
        lookback: usize,
        #[serde(default = "default_entry_z")]
        entry_z: f64,
        #[serde(default = "default_exit_z")]
        exit_z: f64,
        #[serde(default = "default_trade_value")]
        trade_value: f64,
    },
}

impl StrategySpec {
    /// Name used when the config does not give one.
    pub fn default_name(&self) -> String {
        match self {
            StrategySpec::BuyAndHold { .. } => "BuyAndHold".to_string(),
            StrategySpec::MaCrossover {
                short_window,
                long_window,
                ..
            } => format!("MACrossover_{short_window}_{long_window}"),
            StrategySpec::PairsTrading {
                symbol_a, symbol_b, ..
            } => format!("PairsTrading_{symbol_a}_{symbol_b}"),
        }
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |msg: String| Err(StrategyError::InvalidParameter(msg));
        match self {
            StrategySpec::BuyAndHold { allocation } => {
                if !(*allocation > 0.0 && *allocation <= 1.0) {
                    return invalid(format!("allocation must be in (0, 1], got {allocation}"));
                }
            }
            StrategySpec::MaCrossover {
                short_window,
                long_window,
                quantity,
            } => {
                if *short_window == 0 {
                    return invalid("short_window must be positive".into());
                }
                if long_window <= short_window {
                    return invalid(format!(
                        "long_window ({long_window}) must exceed short_window ({short_window})"
                    ));
                }
                if !(quantity.is_finite() && *quantity > 0.0) {
                    return invalid(format!("quantity must be positive, got {quantity}"));
                }
            }
            StrategySpec::PairsTrading {
                symbol_a,
                symbol_b,
                lookback,
                entry_z,
                exit_z,
                trade_value,
            } => {
                if symbol_a.is_empty() || symbol_b.is_empty() || symbol_a == symbol_b {
                    return invalid("pair needs two distinct, non-empty symbols".into());
                }
                if *lookback < 2 {
                    return invalid(format!("lookback must be at least 2, got {lookback}"));
                }
                if !(*exit_z >= 0.0 && entry_z > exit_z) {
                    return invalid(format!(
                        "entry_z ({entry_z}) must exceed exit_z ({exit_z}) >= 0"
                    ));
                }
                if !(*trade_value > 0.0) {
                    return invalid(format!("trade_value must be positive, got {trade_value}"));
                }
            }
        }
        Ok(())
    }

    /// Validate and construct a fresh strategy instance.
    pub fn build(&self, name: &str) -> Result<Box<dyn Strategy>, StrategyError> {
        self.validate()?;
        Ok(match self {
            StrategySpec::BuyAndHold { allocation } => Box::new(BuyAndHold::new(name, *allocation)),
            StrategySpec::MaCrossover {
                short_window,
                long_window,
                quantity,
            } => Box::new(MaCrossover::new(name, *short_window, *long_window, *quantity)),
            StrategySpec::PairsTrading {
                symbol_a,
                symbol_b,
                lookback,
                entry_z,
                exit_z,
                trade_value,
            } => Box::new(PairsTrading::new(
                name,
                symbol_a.as_str(),
                symbol_b.as_str(),
                *lookback,
                *entry_z,
                *exit_z,
                *trade_value,
            )),
        })
    }

    /// Buy-and-hold plus the stock set of MA crossovers.
    pub fn default_set() -> Vec<StrategySpec> {
        let ma = |short_window, long_window| StrategySpec::MaCrossover {
            short_window,
            long_window,
            quantity: 100.0,
        };
        vec![
            StrategySpec::BuyAndHold {
                allocation: default_allocation(),
            },
            ma(5, 20),
            ma(10, 50),
            ma(20, 100),
            ma(3, 15),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_toml() {
        let spec: StrategySpec = toml::from_str(
            r#"
            type = "MA_CROSSOVER"
            short_window = 5
            long_window = 20
            quantity = 100.0
            "#,
        )
        .unwrap();
        assert_eq!(spec.default_name(), "MACrossover_5_20");

        let pairs: StrategySpec = toml::from_str(
            r#"
            type = "PAIRS_TRADING"
            symbol_a = "AAPL"
            symbol_b = "MSFT"
            "#,
        )
        .unwrap();
        assert!(matches!(pairs, StrategySpec::PairsTrading { lookback: 30, .. }));
    }

    #[test]
    fn invalid_parameters_fail_to_build() {
        let bad = [
            StrategySpec::BuyAndHold { allocation: 1.5 },
            StrategySpec::MaCrossover {
                short_window: 20,
                long_window: 5,
                quantity: 1.0,
            },
            StrategySpec::MaCrossover {
                short_window: 0,
                long_window: 5,
                quantity: 1.0,
            },
            StrategySpec::PairsTrading {
                symbol_a: "X".into(),
                symbol_b: "X".into(),
                lookback: 30,
                entry_z: 2.0,
                exit_z: 0.5,
                trade_value: 1.0,
            },
            StrategySpec::PairsTrading {
                symbol_a: "X".into(),
                symbol_b: "Y".into(),
                lookback: 30,
                entry_z: 0.5,
                exit_z: 2.0,
                trade_value: 1.0,
            },
        ];
        for spec in bad {
            assert!(
                matches!(spec.build("x"), Err(StrategyError::InvalidParameter(_))),
                "{spec:?}"
            );
        }
    }

    #[test]
    fn default_set_builds() {
        for spec in StrategySpec::default_set() {
            let name = spec.default_name();
            let strategy = spec.build(&name).unwrap();
            assert_eq!(strategy.name(), name);
        }
    }
}

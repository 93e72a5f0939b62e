//! Look-ahead tests for order execution.
//!
//! Invariant: an order emitted while handling the snapshot at instant t is
//! never filled against a bar at t. It fills at the open of a later bar.

use chrono::{NaiveDate, NaiveDateTime};
use replaylab_core::data::{BarStore, Replayer};
use replaylab_core::domain::{DataSnapshot, PriceBar};
use replaylab_core::engine::{
    Backtest, BacktestConfig, Strategy, StrategyContext, StrategyError,
};
use std::sync::Arc;

fn t(sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(10, 0, sec)
        .unwrap()
}

/// Opens and closes differ on every bar so a same-bar fill would be visible.
fn make_bars(secs: impl Iterator<Item = u32>) -> Vec<PriceBar> {
    secs.map(|s| {
        let open = 100.0 + s as f64;
        let close = open + 0.25;
        PriceBar::new(t(s), open, close + 0.5, open - 0.5, close, 500.0).unwrap()
    })
    .collect()
}

/// Buys one unit of every symbol on every snapshot it sees.
struct BuyEverything;

impl Strategy for BuyEverything {
    fn name(&self) -> &str {
        "buy_everything"
    }

    fn on_market(
        &mut self,
        snapshot: &DataSnapshot,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<(), StrategyError> {
        for symbol in snapshot.symbols() {
            ctx.buy(symbol, 1.0);
        }
        Ok(())
    }
}

#[test]
fn fills_never_use_the_emitting_bar() {
    let store = Arc::new(BarStore::from_series([
        ("A", make_bars(0..10)),
        ("B", make_bars((0..10).step_by(3))),
    ]));
    let source = Replayer::new(Arc::clone(&store)).unwrap();

    let result = Backtest::new(source, Box::new(BuyEverything), BacktestConfig::default())
        .run()
        .unwrap();

    assert!(!result.fills.is_empty());
    for fill in &result.fills {
        let series = store.series(&fill.symbol).unwrap();
        match series.iter().find(|b| b.timestamp() == fill.timestamp) {
            // the symbol printed: fill at that bar's open, never a close
            Some(bar) => assert_eq!(fill.price, bar.open()),
            // the symbol was absent: fill at its last close, strictly earlier
            None => {
                let prior = series
                    .iter()
                    .rev()
                    .find(|b| b.timestamp() < fill.timestamp)
                    .unwrap();
                assert_eq!(fill.price, prior.close());
            }
        }
    }

    // every order from the last instant is still pending when data ends
    let last_orders = result
        .rejected
        .iter()
        .filter(|r| r.order.timestamp == t(9))
        .count();
    assert_eq!(last_orders, 2);
}

#[test]
fn each_order_fills_strictly_after_it_was_emitted() {
    let store = Arc::new(BarStore::from_series([("A", make_bars(0..5))]));
    let source = Replayer::new(store).unwrap();

    let result = Backtest::new(source, Box::new(BuyEverything), BacktestConfig::default())
        .run()
        .unwrap();

    // orders at t0..t3 fill at t1..t4; the t4 order expires
    let fill_times: Vec<NaiveDateTime> = result.fills.iter().map(|f| f.timestamp).collect();
    assert_eq!(fill_times, (1..5).map(t).collect::<Vec<_>>());
    assert_eq!(result.rejected.len(), 1);
}

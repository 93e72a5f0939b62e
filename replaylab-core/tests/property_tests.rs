//! Property tests for replay and accounting invariants.
//!
//! Uses proptest to verify:
//! 1. Replay ordering: snapshots are strictly increasing and every bar appears once
//! 2. Chunk equivalence: chunked replay reproduces the full-load sequence
//! 3. Ledger conservation: the cash identity holds after every fill
//! 4. PnL identity: equity change = realized + unrealized - commission
//! 5. Drawdown: the running figure matches a recomputation over the curve

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use replaylab_core::data::{
    BarStore, ChunkedReplayer, LoadOptions, Replayer, SnapshotSource, StreamOptions,
};
use replaylab_core::domain::{DataSnapshot, Fill, OrderSide, PriceBar};
use replaylab_core::engine::{max_drawdown_pct, Ledger};
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

fn t(sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::seconds(sec as i64)
}

fn bar_at(sec: u32, price: f64) -> PriceBar {
    PriceBar::new(t(sec), price, price * 1.01, price * 0.99, price, 100.0).unwrap()
}

fn drain(source: &mut impl SnapshotSource) -> Vec<DataSnapshot> {
    std::iter::from_fn(|| source.next_snapshot()).collect()
}

// ── Strategies (proptest) ────────────────────────────────────────────

/// Up to four symbols, each with a set of distinct seconds.
fn arb_calendars() -> impl Strategy<Value = Vec<BTreeSet<u32>>> {
    prop::collection::vec(prop::collection::btree_set(0u32..200, 1..40), 1..4)
}

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_fill() -> impl Strategy<Value = (bool, f64, f64, f64)> {
    (
        any::<bool>(),
        (1.0..50.0_f64).prop_map(|q| q.round()),
        arb_price(),
        0.0..5.0_f64,
    )
}

// ── 1. Replay ordering ───────────────────────────────────────────────

proptest! {
    #[test]
    fn replay_is_monotonic_and_complete(calendars in arb_calendars()) {
        let series: Vec<(String, Vec<PriceBar>)> = calendars
            .iter()
            .enumerate()
            .map(|(i, secs)| (format!("S{i}"), secs.iter().map(|&s| bar_at(s, 50.0)).collect()))
            .collect();
        let store = Arc::new(BarStore::from_series(series));
        let total = store.total_bars();
        let mut replayer = Replayer::new(store).unwrap();
        let snaps = drain(&mut replayer);

        prop_assert!(snaps.windows(2).all(|w| w[0].timestamp() < w[1].timestamp()));
        prop_assert_eq!(snaps.iter().map(DataSnapshot::len).sum::<usize>(), total);
        for (i, secs) in calendars.iter().enumerate() {
            let symbol = format!("S{i}");
            let seen: BTreeSet<u32> = snaps
                .iter()
                .filter(|s| s.contains(&symbol))
                .map(|s| (s.timestamp() - t(0)).num_seconds() as u32)
                .collect();
            prop_assert_eq!(&seen, secs);
        }
    }
}

// ── 2. Chunk equivalence ─────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn chunked_replay_equals_full_load(
        calendars in arb_calendars(),
        overlap in prop::collection::btree_set(0u32..200, 0..30),
        chunk_rows in 1usize..12,
        warmup_rows in 0usize..6,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let write = |name: String, secs: &BTreeSet<u32>, close: f64| {
            let mut body = String::from("timestamp,open,high,low,close,volume\n");
            for &s in secs {
                body.push_str(&format!(
                    "{},{close},{},{},{close},7\n",
                    t(s).format("%Y-%m-%d %H:%M:%S"),
                    close + 1.0,
                    close - 1.0
                ));
            }
            fs::write(dir.path().join(name), body).unwrap();
        };
        for (i, secs) in calendars.iter().enumerate() {
            write(format!("s{i}_2024_data.csv"), secs, 20.5 + i as f64);
        }
        // a second file for s0 whose timestamps may collide with the first
        write("s0_2024_data_extra.csv".to_string(), &overlap, 90.5);

        let (store, _) = BarStore::load(dir.path(), &LoadOptions::default()).unwrap();
        let expected = drain(&mut Replayer::new(Arc::new(store)).unwrap());

        let options = StreamOptions { chunk_rows, warmup_rows, start_row: 0 };
        let mut chunked = ChunkedReplayer::open(dir.path(), &LoadOptions::default(), options).unwrap();
        prop_assert_eq!(drain(&mut chunked), expected);
    }
}

// ── 3/4. Ledger identities ───────────────────────────────────────────

proptest! {
    #[test]
    fn ledger_identities_hold(
        fills in prop::collection::vec(arb_fill(), 1..40),
        mark in arb_price(),
    ) {
        let initial = 1_000_000.0;
        let mut ledger = Ledger::new(initial);

        for (i, (buy, qty, price, commission)) in fills.into_iter().enumerate() {
            let fill = Fill {
                timestamp: t(i as u32),
                symbol: "X".into(),
                side: if buy { OrderSide::Buy } else { OrderSide::Sell },
                quantity: qty,
                price,
                commission,
            };
            ledger.apply_fill(&fill).unwrap();
            prop_assert!(ledger.conservation_gap().abs() < 1e-6);
        }

        ledger.mark(&DataSnapshot::new(t(1_000)).with_bar("X", bar_at(1_000, mark)));
        let pnl = ledger.equity() - initial;
        let explained = ledger.realized_pnl() + ledger.unrealized_pnl() - ledger.total_commission();
        prop_assert!((pnl - explained).abs() < 1e-5, "pnl {} vs {}", pnl, explained);
    }
}

// ── 5. Drawdown ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn running_drawdown_matches_curve(prices in prop::collection::vec(arb_price(), 1..60)) {
        let initial = 10_000.0;
        let mut ledger = Ledger::new(initial);
        ledger
            .apply_fill(&Fill {
                timestamp: t(0),
                symbol: "X".into(),
                side: OrderSide::Buy,
                quantity: 10.0,
                price: 100.0,
                commission: 0.0,
            })
            .unwrap();

        for (i, &p) in prices.iter().enumerate() {
            let sec = i as u32 + 1;
            ledger.mark(&DataSnapshot::new(t(sec)).with_bar("X", bar_at(sec, p)));
            ledger.record_equity(t(sec));
        }

        let mut curve = vec![initial];
        curve.extend(ledger.equity_curve().iter().map(|s| s.equity));
        let expected = max_drawdown_pct(&curve);
        prop_assert!((ledger.summary().max_drawdown_pct - expected).abs() < 1e-9);
        prop_assert_eq!(ledger.summary(), ledger.summary());
    }
}

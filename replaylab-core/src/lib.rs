//! ReplayLab Core: bar storage, time-ordered replay, execution, accounting.
//!
//! This crate contains the heart of the replay engine:
//! - Domain types (bars, snapshots, order intents, fills, positions)
//! - CSV ingestion into an immutable, shareable bar store
//! - Globally ordered replay, in memory or chunked from disk with warm-up
//! - Execution simulator with next-snapshot fills and commission
//! - Weighted-average-cost ledger with equity and drawdown tracking
//! - Strategy trait and the snapshot-by-snapshot orchestrator

pub mod data;
pub mod domain;
pub mod engine;
pub mod window;

pub use window::RollingWindow;

//! ReplayLab Runner — batch orchestration over the replay engine.
//!
//! This crate builds on `replaylab-core` to provide:
//! - TOML batch configuration (datasets, cash, commission, streaming)
//! - Reference strategies built from tagged specs
//! - A per-batch dataset cache sharing one `Arc<BarStore>` per dataset
//! - Strategy × dataset execution, sequential or on a rayon pool
//! - Comparison table and JSON export

pub mod batch;
pub mod config;
pub mod dataset;
pub mod report;
pub mod strategies;

pub use batch::{run_batch, BatchError, BatchReport, DatasetInfo, RunFailure, RunKey};
pub use config::{BatchConfig, ConfigError, StrategyEntry};
pub use dataset::{DatasetCache, LoadedDataset};
pub use report::{render_table, to_json, write_json, ReportError};
pub use strategies::{BuyAndHold, MaCrossover, PairsTrading, StrategySpec};

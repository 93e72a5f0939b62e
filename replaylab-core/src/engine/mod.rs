//! Backtesting engine: execution, accounting, strategies and the
//! snapshot-by-snapshot orchestrator.

pub mod backtest;
pub mod event;
pub mod guard;
pub mod ledger;
pub mod metrics;
pub mod simulator;
pub mod strategy;

pub use backtest::{Backtest, BacktestConfig, RunError, RunResult, RunState, StepOutcome};
pub use event::{Event, EventQueue};
pub use guard::{CashFloor, RejectedOrder, RejectionReason};
pub use ledger::{Ledger, LedgerError};
pub use metrics::{max_drawdown_pct, total_return_pct, EquitySample, RunSummary};
pub use simulator::{CommissionModel, ExecutionError, ExecutionSimulator};
pub use strategy::{Strategy, StrategyContext, StrategyError};

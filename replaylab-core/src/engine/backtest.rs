//! Orchestrator: drives one strategy over one snapshot source.
//!
//! Per instant:
//! 1. Orders deferred from earlier instants go through the event queue:
//!    cash floor check, execution, fill, ledger, `on_fill`.
//! 2. The market event is handled: price cache refresh, marks, `on_market`.
//!    Orders emitted here wait for the next instant.
//! 3. Equity is sampled.

use super::event::{Event, EventQueue};
use super::guard::{CashFloor, RejectedOrder, RejectionReason};
use super::ledger::Ledger;
use super::metrics::{EquitySample, RunSummary};
use super::simulator::{CommissionModel, ExecutionError, ExecutionSimulator};
use super::strategy::{Strategy, StrategyContext, StrategyError};
use crate::data::SnapshotSource;
use crate::domain::{DataSnapshot, Fill, OrderIntent};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    /// Orders that would take cash below this are rejected before execution.
    pub cash_floor: Option<f64>,
    pub commission: CommissionModel,
    /// Bars of history handed to `on_warmup` per symbol.
    pub warmup_lookback: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            cash_floor: None,
            commission: CommissionModel::default(),
            warmup_lookback: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Ready,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("strategy {strategy} failed at {timestamp}: {source}")]
    Strategy {
        strategy: String,
        timestamp: NaiveDateTime,
        #[source]
        source: StrategyError,
    },

    #[error("run cannot continue from state {0:?}")]
    NotRunnable(RunState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { timestamp: NaiveDateTime, fills: usize },
    Finished,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy: String,
    pub summary: RunSummary,
    pub equity_curve: Vec<EquitySample>,
    pub fills: Vec<Fill>,
    pub rejected: Vec<RejectedOrder>,
    /// Snapshots processed.
    pub instants: usize,
}

pub struct Backtest<S: SnapshotSource> {
    source: S,
    strategy: Box<dyn Strategy>,
    config: BacktestConfig,
    simulator: ExecutionSimulator,
    ledger: Ledger,
    queue: EventQueue,
    deferred: Vec<OrderIntent>,
    fills: Vec<Fill>,
    rejected: Vec<RejectedOrder>,
    instants: usize,
    state: RunState,
}

impl<S: SnapshotSource> Backtest<S> {
    pub fn new(source: S, strategy: Box<dyn Strategy>, config: BacktestConfig) -> Self {
        Self {
            source,
            strategy,
            simulator: ExecutionSimulator::new(config.commission),
            ledger: Ledger::new(config.initial_cash),
            config,
            queue: EventQueue::new(),
            deferred: Vec::new(),
            fills: Vec::new(),
            rejected: Vec::new(),
            instants: 0,
            state: RunState::Ready,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn simulator(&self) -> &ExecutionSimulator {
        &self.simulator
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn rejected(&self) -> &[RejectedOrder] {
        &self.rejected
    }

    /// Orders waiting for the next instant.
    pub fn pending_orders(&self) -> &[OrderIntent] {
        &self.deferred
    }

    /// Run to exhaustion.
    pub fn run(self) -> Result<RunResult, RunError> {
        self.run_with_source().map(|(result, _)| result)
    }

    /// Run to exhaustion and hand the source back, e.g. for its load report.
    pub fn run_with_source(mut self) -> Result<(RunResult, S), RunError> {
        while let StepOutcome::Advanced { .. } = self.step()? {}
        Ok(self.into_parts())
    }

    /// Process one instant.
    pub fn step(&mut self) -> Result<StepOutcome, RunError> {
        match self.state {
            RunState::Ready => self.start(),
            RunState::Running => {}
            RunState::Finished => return Ok(StepOutcome::Finished),
            RunState::Failed => return Err(RunError::NotRunnable(RunState::Failed)),
        }

        let Some(snapshot) = self.source.next_snapshot() else {
            self.finish();
            return Ok(StepOutcome::Finished);
        };
        let now = snapshot.timestamp();
        let fills_before = self.fills.len();

        for order in std::mem::take(&mut self.deferred) {
            self.queue.push(Event::Order(order));
        }
        self.drain(&snapshot)?;

        self.queue.push(Event::Market(snapshot.clone()));
        self.drain(&snapshot)?;

        self.ledger.record_equity(now);
        self.instants += 1;

        Ok(StepOutcome::Advanced {
            timestamp: now,
            fills: self.fills.len() - fills_before,
        })
    }

    fn start(&mut self) {
        for symbol in self.source.symbols() {
            let bars = self.source.warmup_bars(&symbol, self.config.warmup_lookback);
            if !bars.is_empty() {
                tracing::debug!(%symbol, bars = bars.len(), "warming up strategy");
                self.strategy.on_warmup(&symbol, &bars);
            }
        }
        tracing::info!(
            strategy = self.strategy.name(),
            start = %self.source.current_time(),
            initial_cash = self.config.initial_cash,
            "run started"
        );
        self.state = RunState::Running;
    }

    fn finish(&mut self) {
        let now = self.source.current_time();
        for order in std::mem::take(&mut self.deferred) {
            self.reject(now, order, RejectionReason::Expired, "no further data".into());
        }
        self.state = RunState::Finished;
        let summary = self.ledger.summary();
        tracing::info!(
            strategy = self.strategy.name(),
            instants = self.instants,
            fills = summary.fill_count,
            final_equity = summary.final_equity,
            return_pct = summary.total_return_pct,
            "run finished"
        );
    }

    fn drain(&mut self, reference: &DataSnapshot) -> Result<(), RunError> {
        let now = reference.timestamp();
        while let Some(event) = self.queue.pop() {
            match event {
                Event::Order(order) => self.handle_order(order, reference),
                Event::Fill(fill) => self.handle_fill(fill, now)?,
                Event::Market(snapshot) => self.handle_market(&snapshot)?,
            }
        }
        Ok(())
    }

    fn handle_order(&mut self, order: OrderIntent, reference: &DataSnapshot) {
        let now = reference.timestamp();
        if order.timestamp >= now {
            self.deferred.push(order);
            return;
        }

        if let Some(floor) = self.config.cash_floor.map(CashFloor::new) {
            let verdict = floor.evaluate(
                &order,
                self.simulator.last_price(&order.symbol),
                self.ledger.cash(),
                self.simulator.commission_model(),
            );
            if let Some(context) = verdict {
                self.reject(now, order, RejectionReason::CashFloor, context);
                return;
            }
        }

        match self.simulator.execute(&order, reference) {
            // settle before the next queued order is checked against cash
            Ok(fill) => self.queue.push_front(Event::Fill(fill)),
            Err(e) => {
                let reason = match e {
                    ExecutionError::UnsupportedOrderType(_) => RejectionReason::UnsupportedOrderType,
                    ExecutionError::InvalidQuantity(_) => RejectionReason::InvalidQuantity,
                    ExecutionError::NoReferencePrice { .. } => RejectionReason::NoPrice,
                };
                self.reject(now, order, reason, e.to_string());
            }
        }
    }

    fn handle_fill(&mut self, fill: Fill, now: NaiveDateTime) -> Result<(), RunError> {
        if let Err(e) = self.ledger.apply_fill(&fill) {
            let order = OrderIntent::market(fill.timestamp, fill.symbol.clone(), fill.side, fill.quantity);
            self.reject(now, order, RejectionReason::InvalidFill, e.to_string());
            return Ok(());
        }

        let mut ctx = StrategyContext::new(now, &self.ledger);
        let outcome = self.strategy.on_fill(&fill, &mut ctx);
        let orders = ctx.into_orders();
        self.fills.push(fill);
        outcome.map_err(|e| self.fail(now, e))?;
        self.deferred.extend(orders);
        Ok(())
    }

    fn handle_market(&mut self, snapshot: &DataSnapshot) -> Result<(), RunError> {
        let now = snapshot.timestamp();
        self.simulator.observe(snapshot);
        self.ledger.mark(snapshot);

        let mut ctx = StrategyContext::new(now, &self.ledger);
        let outcome = self.strategy.on_market(snapshot, &mut ctx);
        let orders = ctx.into_orders();
        outcome.map_err(|e| self.fail(now, e))?;
        self.deferred.extend(orders);
        Ok(())
    }

    fn reject(
        &mut self,
        now: NaiveDateTime,
        order: OrderIntent,
        reason: RejectionReason,
        context: String,
    ) {
        tracing::warn!(
            strategy = self.strategy.name(),
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            %reason,
            %context,
            "order dropped"
        );
        self.rejected.push(RejectedOrder {
            timestamp: now,
            order,
            reason,
            context,
        });
    }

    fn fail(&mut self, now: NaiveDateTime, source: StrategyError) -> RunError {
        self.state = RunState::Failed;
        let strategy = self.strategy.name().to_string();
        tracing::error!(%strategy, timestamp = %now, error = %source, "strategy failed, aborting run");
        RunError::Strategy {
            strategy,
            timestamp: now,
            source,
        }
    }

    fn into_parts(self) -> (RunResult, S) {
        let result = RunResult {
            strategy: self.strategy.name().to_string(),
            summary: self.ledger.summary(),
            equity_curve: self.ledger.equity_curve().to_vec(),
            fills: self.fills,
            rejected: self.rejected,
            instants: self.instants,
        };
        (result, self.source)
    }
}

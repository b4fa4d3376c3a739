//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{MarketSnapshot, OrderExecution, OrderIntent};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;

    /// Symbol the strategy trades.
    fn symbol(&self) -> &str;
}

/// Decision logic of one strategy kind.
///
/// A worker owns its algorithm exclusively: the engine calls `initialize`
/// once, then `evaluate` every cycle and `on_fill` for every confirmed
/// execution of an intent returned by `evaluate`.
pub trait TradingAlgorithm: Send {
    /// Get the display name of this algorithm.
    fn name(&self) -> &str;

    /// Get the symbol this algorithm trades.
    fn symbol(&self) -> &str;

    /// Prime strategy-local state before the first evaluation.
    fn initialize(&mut self) -> Result<(), StrategyError> {
        Ok(())
    }

    /// Decide which orders to place for the current market snapshot.
    ///
    /// # Returns
    /// Zero or more order intents, submitted in order
    fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Vec<OrderIntent>;

    /// Called when the exchange confirms a (partial) fill of an intent.
    ///
    /// # Returns
    /// The realized profit/loss when the fill reduces a position
    fn on_fill(
        &mut self,
        intent: &OrderIntent,
        execution: &OrderExecution,
        at: DateTime<Utc>,
    ) -> Option<Decimal>;

    /// Called when submitting an intent ended without a confirmation, so
    /// the order may or may not have executed.
    fn on_unconfirmed(&mut self, _intent: &OrderIntent, _at: DateTime<Utc>) {}

    /// Interval between evaluations; `None` uses the engine default.
    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    /// Get a description of the algorithm.
    fn description(&self) -> &str {
        ""
    }
}

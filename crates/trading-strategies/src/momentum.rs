//! Momentum/Trend Following Strategy.
//!
//! Tracks the rate of change of the last price over a lookback window of
//! evaluations. Buys when flat and momentum exceeds the threshold,
//! sells the inventory when momentum turns negative past the threshold.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;
use trading_core::{
    error::StrategyError,
    traits::{StrategyConfig, TradingAlgorithm},
    types::{MarketSnapshot, OrderExecution, OrderIntent, OrderRequest, Side},
};

use crate::book::PositionBook;
use crate::params::{default_order_size, default_symbol, validate_magnitude, validate_symbol};

fn default_lookback() -> usize {
    20
}

fn default_threshold_pct() -> Decimal {
    dec!(1.0)
}

/// Configuration for the Momentum strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    /// Symbol to trade
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Number of evaluations the rate of change spans
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Minimum absolute rate of change for entry/exit, in percent
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: Decimal,
    /// Base quantity bought on entry
    #[serde(default = "default_order_size")]
    pub order_size: Decimal,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            lookback: default_lookback(),
            threshold_pct: default_threshold_pct(),
            order_size: default_order_size(),
        }
    }
}

impl StrategyConfig for MomentumConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        validate_symbol(&self.symbol)?;
        if !(2..=1000).contains(&self.lookback) {
            return Err(StrategyError::InvalidConfig(
                "Lookback must be between 2 and 1000".into(),
            ));
        }
        if self.threshold_pct <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Threshold must be greater than 0".into(),
            ));
        }
        validate_magnitude("Threshold", self.threshold_pct)?;
        if self.order_size <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Order size must be greater than 0".into(),
            ));
        }
        validate_magnitude("Order size", self.order_size)?;
        Ok(())
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Momentum/Trend Following Strategy.
pub struct MomentumStrategy {
    config: MomentumConfig,
    prices: VecDeque<Decimal>,
    book: PositionBook,
    last_momentum: Option<Decimal>,
}

impl MomentumStrategy {
    /// Create a new Momentum strategy.
    pub fn new(config: MomentumConfig) -> Self {
        let capacity = config.lookback + 1;
        Self {
            config,
            prices: VecDeque::with_capacity(capacity),
            book: PositionBook::new(),
            last_momentum: None,
        }
    }

    /// Rate of change observed on the last evaluation, in percent.
    pub fn last_momentum(&self) -> Option<Decimal> {
        self.last_momentum
    }

    /// Calculate momentum as rate of change over the window.
    fn calculate_momentum(&self) -> Option<Decimal> {
        if self.prices.len() < self.config.lookback + 1 {
            return None;
        }
        let past = *self.prices.front()?;
        let current = *self.prices.back()?;
        if past == Decimal::ZERO {
            return None;
        }
        let momentum = current
            .checked_sub(past)
            .and_then(|change| change.checked_div(past))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
        if momentum.is_none() {
            warn!(symbol = %self.config.symbol, %past, %current, "Rate of change out of range");
        }
        momentum
    }
}

impl TradingAlgorithm for MomentumStrategy {
    fn name(&self) -> &str {
        "Momentum"
    }

    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn description(&self) -> &str {
        "Follows strong trends using the rate of change over a lookback window"
    }

    fn initialize(&mut self) -> Result<(), StrategyError> {
        self.config.validate()?;
        self.prices.clear();
        Ok(())
    }

    fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Vec<OrderIntent> {
        self.prices.push_back(snapshot.ticker.last);
        while self.prices.len() > self.config.lookback + 1 {
            self.prices.pop_front();
        }

        let Some(momentum) = self.calculate_momentum() else {
            return Vec::new();
        };
        self.last_momentum = Some(momentum);

        let threshold = self.config.threshold_pct;
        if self.book.is_flat() && momentum >= threshold {
            vec![OrderIntent::new(
                OrderRequest::market(&self.config.symbol, Side::Buy, self.config.order_size),
                format!("momentum {}% above {}%", momentum.round_dp(2), threshold),
            )]
        } else if !self.book.is_flat() && momentum <= -threshold {
            vec![OrderIntent::new(
                OrderRequest::market(&self.config.symbol, Side::Sell, self.book.quantity),
                format!("momentum {}% below -{}%", momentum.round_dp(2), threshold),
            )]
        } else {
            Vec::new()
        }
    }

    fn on_fill(
        &mut self,
        intent: &OrderIntent,
        execution: &OrderExecution,
        _at: DateTime<Utc>,
    ) -> Option<Decimal> {
        let price = execution.avg_price.unwrap_or_default();
        self.book
            .apply_fill(intent.request.side, execution.filled_quantity, price)
    }

    fn on_unconfirmed(&mut self, _intent: &OrderIntent, _at: DateTime<Utc>) {
        // Require a fresh window before acting again.
        self.prices.clear();
    }
}

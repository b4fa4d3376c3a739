//! Dollar-Cost Averaging Strategy.
//!
//! Buys a fixed quote amount every `interval_secs`, up to `max_orders`
//! buys per accumulation round. With `take_profit_pct` set, the whole
//! inventory is sold once the price reaches the average entry plus that
//! percentage, which starts a new round.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use trading_core::{
    error::StrategyError,
    traits::{StrategyConfig, TradingAlgorithm},
    types::{MarketSnapshot, OrderExecution, OrderIntent, OrderRequest, Side},
};

use crate::book::PositionBook;
use crate::params::{default_symbol, validate_magnitude, validate_symbol};

/// Longest accepted interval between buys (30 days).
const MAX_INTERVAL_SECS: u64 = 30 * 24 * 3600;

fn default_interval_secs() -> u64 {
    3600
}

/// Configuration for the DCA strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcaConfig {
    /// Symbol to trade
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Quote currency spent per buy
    pub quote_amount: Decimal,
    /// Seconds between buys
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum buys per accumulation round
    #[serde(default)]
    pub max_orders: Option<u32>,
    /// Sell everything at this gain over the average entry, in percent
    #[serde(default)]
    pub take_profit_pct: Option<Decimal>,
}

impl Default for DcaConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            quote_amount: Decimal::from(10),
            interval_secs: default_interval_secs(),
            max_orders: None,
            take_profit_pct: None,
        }
    }
}

impl StrategyConfig for DcaConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        validate_symbol(&self.symbol)?;
        if self.quote_amount <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Quote amount must be greater than 0".into(),
            ));
        }
        validate_magnitude("Quote amount", self.quote_amount)?;
        if self.interval_secs == 0 || self.interval_secs > MAX_INTERVAL_SECS {
            return Err(StrategyError::InvalidConfig(format!(
                "Interval must be between 1 and {} seconds",
                MAX_INTERVAL_SECS
            )));
        }
        if self.max_orders == Some(0) {
            return Err(StrategyError::InvalidConfig(
                "Max orders must be greater than 0".into(),
            ));
        }
        if matches!(self.take_profit_pct, Some(pct) if pct <= Decimal::ZERO) {
            return Err(StrategyError::InvalidConfig(
                "Take profit must be greater than 0".into(),
            ));
        }
        if let Some(pct) = self.take_profit_pct {
            validate_magnitude("Take profit", pct)?;
        }
        Ok(())
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Dollar-Cost Averaging Strategy.
pub struct DcaStrategy {
    config: DcaConfig,
    book: PositionBook,
    last_buy_at: Option<DateTime<Utc>>,
    buys_this_round: u32,
}

impl DcaStrategy {
    /// Create a new DCA strategy.
    pub fn new(config: DcaConfig) -> Self {
        Self {
            config,
            book: PositionBook::new(),
            last_buy_at: None,
            buys_this_round: 0,
        }
    }

    /// Current inventory.
    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    fn take_profit_target(&self) -> Option<Decimal> {
        let pct = self.config.take_profit_pct?;
        if self.book.is_flat() {
            return None;
        }
        let factor = Decimal::ONE.checked_add(pct / Decimal::ONE_HUNDRED)?;
        self.book.avg_entry_price.checked_mul(factor)
    }

    fn buy_due(&self, now: DateTime<Utc>) -> bool {
        let interval = chrono::Duration::seconds(self.config.interval_secs as i64);
        let waited = self
            .last_buy_at
            .map(|last| now - last >= interval)
            .unwrap_or(true);
        let under_cap = self
            .config
            .max_orders
            .map(|max| self.buys_this_round < max)
            .unwrap_or(true);
        waited && under_cap
    }
}

impl TradingAlgorithm for DcaStrategy {
    fn name(&self) -> &str {
        "DCA"
    }

    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn description(&self) -> &str {
        "Buys a fixed quote amount on a schedule with optional take-profit"
    }

    fn initialize(&mut self) -> Result<(), StrategyError> {
        self.config.validate()
    }

    fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Vec<OrderIntent> {
        let ticker = &snapshot.ticker;

        if let Some(target) = self.take_profit_target() {
            if ticker.last >= target {
                return vec![OrderIntent::new(
                    OrderRequest::market(&self.config.symbol, Side::Sell, self.book.quantity),
                    format!("take profit: {} reached target {}", ticker.last, target),
                )];
            }
        }

        if ticker.ask <= Decimal::ZERO || !self.buy_due(snapshot.at) {
            return Vec::new();
        }

        let Some(quantity) = self.config.quote_amount.checked_div(ticker.ask) else {
            warn!(symbol = %self.config.symbol, ask = %ticker.ask, "Buy quantity out of range, skipping");
            return Vec::new();
        };
        let quantity = quantity.round_dp(8);
        if quantity <= Decimal::ZERO {
            return Vec::new();
        }

        vec![OrderIntent::new(
            OrderRequest::market(&self.config.symbol, Side::Buy, quantity),
            format!("scheduled buy of {} quote at {}", self.config.quote_amount, ticker.ask),
        )]
    }

    fn on_fill(
        &mut self,
        intent: &OrderIntent,
        execution: &OrderExecution,
        at: DateTime<Utc>,
    ) -> Option<Decimal> {
        let price = execution.avg_price.unwrap_or_default();
        let side = intent.request.side;
        let pnl = self.book.apply_fill(side, execution.filled_quantity, price);

        match side {
            Side::Buy => {
                self.last_buy_at = Some(at);
                self.buys_this_round += 1;
            }
            Side::Sell if self.book.is_flat() => {
                self.buys_this_round = 0;
            }
            Side::Sell => {}
        }

        pnl
    }

    fn on_unconfirmed(&mut self, intent: &OrderIntent, at: DateTime<Utc>) {
        // A buy that may have executed still consumes its slot in the schedule.
        if intent.request.side == Side::Buy {
            self.last_buy_at = Some(at);
        }
    }
}

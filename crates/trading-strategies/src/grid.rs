//! Grid Trading Strategy.
//!
//! Splits the range between `lower` and `upper` into evenly spaced price
//! levels. Every level crossed downward buys one `order_size`, every level
//! crossed upward sells one `order_size` out of the held inventory.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trading_core::{
    error::StrategyError,
    traits::{StrategyConfig, TradingAlgorithm},
    types::{MarketSnapshot, OrderExecution, OrderIntent, OrderRequest, Side},
};

use crate::book::PositionBook;
use crate::params::{default_order_size, default_symbol, validate_magnitude, validate_symbol};

const MAX_LEVELS: usize = 200;

/// Configuration for the Grid strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Symbol to trade
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Lowest grid level
    pub lower: Decimal,
    /// Highest grid level
    pub upper: Decimal,
    /// Number of levels, bounds included
    pub levels: usize,
    /// Base quantity traded per level crossed
    #[serde(default = "default_order_size")]
    pub order_size: Decimal,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            lower: Decimal::from(20_000),
            upper: Decimal::from(30_000),
            levels: 5,
            order_size: default_order_size(),
        }
    }
}

impl StrategyConfig for GridConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        validate_symbol(&self.symbol)?;
        if self.lower <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(
                "Lower bound must be greater than 0".into(),
            ));
        }
        if self.lower >= self.upper {
            return Err(StrategyError::InvalidConfig(
                "Lower bound must be less than upper bound".into(),
            ));
        }
        validate_magnitude("Upper bound", self.upper)?;
        if !(2..=MAX_LEVELS).contains(&self.levels) {
            return Err(StrategyError::InvalidConfig(format!(
                "Levels must be between 2 and {}",
                MAX_LEVELS
            )));
        }
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

/// Grid Trading Strategy.
pub struct GridStrategy {
    config: GridConfig,
    levels: Vec<Decimal>,
    /// Number of levels at or below the last observed price
    band: Option<usize>,
    book: PositionBook,
}

impl GridStrategy {
    /// Create a new Grid strategy.
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            levels: Vec::new(),
            band: None,
            book: PositionBook::new(),
        }
    }

    /// Computed price levels, ascending.
    pub fn levels(&self) -> &[Decimal] {
        &self.levels
    }

    /// Current inventory.
    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    fn band_of(&self, price: Decimal) -> usize {
        self.levels.iter().filter(|level| **level <= price).count()
    }
}

impl TradingAlgorithm for GridStrategy {
    fn name(&self) -> &str {
        "Grid"
    }

    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn description(&self) -> &str {
        "Buys each level crossed downward and sells each level crossed upward"
    }

    fn initialize(&mut self) -> Result<(), StrategyError> {
        self.config.validate()?;

        let intervals = Decimal::from(self.config.levels - 1);
        let step = (self.config.upper - self.config.lower) / intervals;
        self.levels = (0..self.config.levels)
            .map(|i| self.config.lower + step * Decimal::from(i))
            .collect();
        // Avoid drift on the top level.
        if let Some(top) = self.levels.last_mut() {
            *top = self.config.upper;
        }
        self.band = None;
        Ok(())
    }

    fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Vec<OrderIntent> {
        let price = snapshot.ticker.last;
        let band = self.band_of(price);
        let previous = self.band.replace(band);

        let Some(previous) = previous else {
            debug!(symbol = %self.config.symbol, %price, band, "grid primed");
            return Vec::new();
        };

        if band < previous {
            let crossed = previous - band;
            let Some(quantity) = self.config.order_size.checked_mul(Decimal::from(crossed)) else {
                warn!(symbol = %self.config.symbol, crossed, "Grid quantity out of range");
                return Vec::new();
            };
            vec![OrderIntent::new(
                OrderRequest::market(&self.config.symbol, Side::Buy, quantity),
                format!("price {} crossed {} grid level(s) downward", price, crossed),
            )]
        } else if band > previous {
            let crossed = band - previous;
            let quantity = self
                .config
                .order_size
                .checked_mul(Decimal::from(crossed))
                .unwrap_or(Decimal::MAX)
                .min(self.book.quantity);
            if quantity <= Decimal::ZERO {
                return Vec::new();
            }
            vec![OrderIntent::new(
                OrderRequest::market(&self.config.symbol, Side::Sell, quantity),
                format!("price {} crossed {} grid level(s) upward", price, crossed),
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
}

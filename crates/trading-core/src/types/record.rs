//! Append-only records written by workers and the manager.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Side, StrategyId};

/// A confirmed execution attributed to a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub strategy_id: StrategyId,
    /// Exchange order ID of the confirmed fill
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Realized profit/loss; `None` until a fill reduces a position
    pub pnl: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Notional value of the trade.
    pub fn value(&self) -> Decimal {
        self.quantity * self.price
    }
}

/// Severity of a persisted log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// User-visible log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// `None` for system-wide entries
    pub strategy_id: Option<StrategyId>,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(strategy_id: Option<StrategyId>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            strategy_id,
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

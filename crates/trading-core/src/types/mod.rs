//! Core data types for the strategy execution engine.

mod market;
mod order;
mod record;
mod strategy;

pub use market::{AssetBalance, Balances, MarketSnapshot, Ticker};
pub use order::{OpenOrder, OrderExecution, OrderIntent, OrderRequest, OrderType, Side};
pub use record::{LogEntry, LogLevel, Trade};
pub use strategy::{
    NewStrategy, StrategyDefinition, StrategyId, StrategyKind, StrategyRecord, StrategyStatus,
};

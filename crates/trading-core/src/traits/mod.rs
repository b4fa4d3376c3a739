//! Core traits for the strategy execution engine.

mod exchange;
mod store;
mod strategy;

pub use exchange::ExchangeGateway;
pub use store::PersistenceStore;
pub use strategy::{StrategyConfig, TradingAlgorithm};

//! Trading strategy implementations.
//!
//! This crate provides the closed set of strategy kinds the engine can run:
//! - Grid trading between a lower and upper bound
//! - Dollar-cost averaging with optional take-profit
//! - Momentum (rate of change) trend following
//!
//! Raw parameter maps are validated eagerly into typed configs through
//! [`StrategyParams::resolve`], so a running worker never re-validates.

mod book;
mod dca;
mod grid;
mod momentum;
mod params;
mod registry;

pub use book::PositionBook;
pub use dca::{DcaConfig, DcaStrategy};
pub use grid::{GridConfig, GridStrategy};
pub use momentum::{MomentumConfig, MomentumStrategy};
pub use params::{StrategyParams, DEFAULT_SYMBOL, MAX_MAGNITUDE};
pub use registry::{StrategyInfo, StrategyRegistry};

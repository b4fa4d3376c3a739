//! Strategy execution engine.
//!
//! [`StrategyManager`] owns the lifecycle of every strategy and runs each
//! active one as a [`StrategyWorker`] on its own tokio task.

pub mod config;
pub mod gateway;
pub mod handle;
pub mod journal;
pub mod manager;
pub mod retry;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, RetryPolicy};
pub use gateway::TimedExchange;
pub use handle::{WorkerInfo, WorkerState};
pub use journal::Journal;
pub use manager::{ShutdownReport, StrategyManager};
pub use retry::ExponentialBackoff;
pub use worker::{StrategyWorker, WorkerOutcome};

//! Core types and traits for the strategy execution engine.
//!
//! This crate provides the foundational building blocks including:
//! - Strategy definitions, statuses, trades and log entries
//! - Market snapshot and order types exchanged with the gateway
//! - The exchange gateway and persistence store contracts
//! - The trading algorithm trait implemented by every strategy kind

pub mod types;
pub mod traits;
pub mod error;

pub use error::{TradingError, TradingResult};
pub use types::*;
pub use traits::*;

//! CLI command implementations.

pub mod run;
pub mod strategies;
pub mod validate;
pub mod validate_strategy;

//! Operator logging and dashboard aggregates.

mod logging;
mod summary;

pub use logging::setup_logging;
pub use summary::DashboardSummary;

//! Dashboard aggregate over strategies and trades.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::warn;
use trading_core::types::{StrategyId, StrategyStatus, Trade};

/// Headline numbers shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// Strategies currently running
    pub active_count: usize,
    /// Realized profit/loss summed over the given trades
    pub total_pnl: Decimal,
    /// Trades executed on the reporting day
    pub daily_trades: usize,
    /// Free balance of the quote asset, zero when it could not be fetched
    pub quote_balance: Decimal,
    pub exchange_connected: bool,
}

impl DashboardSummary {
    /// Aggregate the dashboard numbers.
    ///
    /// `quote_balance` is `None` when the exchange could not be reached.
    pub fn collect(
        statuses: &[(StrategyId, StrategyStatus)],
        trades: &[Trade],
        quote_balance: Option<Decimal>,
        today: NaiveDate,
    ) -> Self {
        if quote_balance.is_none() {
            warn!("Exchange unreachable, quote balance unavailable");
        }
        Self {
            active_count: statuses
                .iter()
                .filter(|(_, status)| *status == StrategyStatus::Running)
                .count(),
            total_pnl: trades.iter().filter_map(|t| t.pnl).sum(),
            daily_trades: trades
                .iter()
                .filter(|t| t.timestamp.date_naive() == today)
                .count(),
            quote_balance: quote_balance.unwrap_or(Decimal::ZERO),
            exchange_connected: quote_balance.is_some(),
        }
    }
}

impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Active strategies: {}", self.active_count)?;
        writeln!(f, "Total P&L:         {:.2}", self.total_pnl)?;
        writeln!(f, "Trades today:      {}", self.daily_trades)?;
        writeln!(f, "Quote balance:     {:.2}", self.quote_balance)?;
        write!(
            f,
            "Exchange:          {}",
            if self.exchange_connected { "connected" } else { "unreachable" }
        )
    }
}

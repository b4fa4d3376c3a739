//! Exchange gateway trait definition.

use crate::error::ExchangeError;
use crate::types::{Balances, OpenOrder, OrderExecution, OrderRequest, Ticker};
use async_trait::async_trait;

/// Narrow capability contract over an exchange API client.
///
/// Implementations must be safe for concurrent use: every worker and the
/// manager share one gateway. Errors must be mapped onto [`ExchangeError`]
/// so the engine can tell transient failures from structural ones.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Get best bid/ask and last price for a symbol.
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;

    /// Get free/locked balances for every asset on the account.
    async fn get_balance(&self) -> Result<Balances, ExchangeError>;

    /// Submit a new order.
    ///
    /// # Returns
    /// The exchange order ID with whatever quantity filled on submission
    async fn place_order(&self, request: OrderRequest) -> Result<OrderExecution, ExchangeError>;

    /// Cancel a resting order.
    ///
    /// # Arguments
    /// * `order_id` - The exchange ID of the order to cancel
    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError>;

    /// List resting orders, optionally restricted to one symbol.
    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ExchangeError>;

    /// Get the exchange name.
    fn name(&self) -> &str;
}

//! Request timeout enforcement for exchange calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use trading_core::error::ExchangeError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{Balances, OpenOrder, OrderExecution, OrderRequest, Ticker};

/// Gateway wrapper that bounds every request by a timeout.
///
/// An elapsed request surfaces as [`ExchangeError::Timeout`], which the
/// workers classify as transient.
pub struct TimedExchange {
    inner: Arc<dyn ExchangeGateway>,
    timeout: Duration,
}

impl TimedExchange {
    pub fn new(inner: Arc<dyn ExchangeGateway>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, ExchangeError>>,
    ) -> Result<T, ExchangeError> {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| ExchangeError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl ExchangeGateway for TimedExchange {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.bounded(self.inner.get_ticker(symbol)).await
    }

    async fn get_balance(&self) -> Result<Balances, ExchangeError> {
        self.bounded(self.inner.get_balance()).await
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderExecution, ExchangeError> {
        self.bounded(self.inner.place_order(request)).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.bounded(self.inner.cancel_order(order_id)).await
    }

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.bounded(self.inner.list_open_orders(symbol)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

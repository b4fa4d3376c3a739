//! Paper exchange for simulation mode and tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use trading_core::error::ExchangeError;
use trading_core::traits::ExchangeGateway;
use trading_core::types::{
    AssetBalance, Balances, OpenOrder, OrderExecution, OrderRequest, OrderType, Side, Ticker,
};
use uuid::Uuid;

use crate::split_symbol;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory exchange that fills marketable orders against set prices.
///
/// Market orders fill immediately at the ask (buys) or bid (sells).
/// Limit orders fill immediately when marketable, otherwise they rest on
/// the book with their funds locked until canceled.
#[derive(Clone)]
pub struct PaperExchange {
    tickers: Arc<Mutex<HashMap<String, Ticker>>>,
    balances: Arc<Mutex<HashMap<String, AssetBalance>>>,
    orders: Arc<Mutex<HashMap<String, OpenOrder>>>,
    spread_pct: Decimal,
}

impl PaperExchange {
    /// Create an empty paper exchange with no spread.
    pub fn new() -> Self {
        Self {
            tickers: Arc::new(Mutex::new(HashMap::new())),
            balances: Arc::new(Mutex::new(HashMap::new())),
            orders: Arc::new(Mutex::new(HashMap::new())),
            spread_pct: Decimal::ZERO,
        }
    }

    /// Set the bid/ask spread as a percentage of the last price.
    pub fn with_spread(mut self, spread_pct: Decimal) -> Self {
        self.spread_pct = spread_pct;
        self
    }

    /// Credit a free balance.
    pub fn with_balance(self, asset: impl Into<String>, amount: Decimal) -> Self {
        self.deposit(asset, amount);
        self
    }

    /// Set the starting price of a symbol.
    pub fn with_price(self, symbol: impl Into<String>, last: Decimal) -> Self {
        self.set_price(symbol, last);
        self
    }

    /// Credit a free balance.
    pub fn deposit(&self, asset: impl Into<String>, amount: Decimal) {
        let mut balances = lock(&self.balances);
        balances.entry(asset.into()).or_default().free += amount;
    }

    /// Move the market for a symbol.
    pub fn set_price(&self, symbol: impl Into<String>, last: Decimal) {
        let symbol = symbol.into();
        let half_spread = last * self.spread_pct / dec!(200);
        let ticker = Ticker {
            symbol: symbol.clone(),
            bid: last - half_spread,
            ask: last + half_spread,
            last,
        };
        lock(&self.tickers).insert(symbol, ticker);
    }

    /// Last price of a symbol, if it is listed.
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        lock(&self.tickers).get(symbol).map(|t| t.last)
    }

    /// Snapshot of one asset balance.
    pub fn balance(&self, asset: &str) -> AssetBalance {
        lock(&self.balances).get(asset).copied().unwrap_or_default()
    }

    fn settle(
        &self,
        side: Side,
        base: &str,
        quote: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(), ExchangeError> {
        let mut balances = lock(&self.balances);
        let (debit_asset, debit, credit_asset, credit) = match side {
            Side::Buy => (quote, quantity * price, base, quantity),
            Side::Sell => (base, quantity, quote, quantity * price),
        };

        let available = balances.get(debit_asset).map(|b| b.free).unwrap_or_default();
        if available < debit {
            return Err(ExchangeError::InsufficientBalance {
                asset: debit_asset.to_string(),
                required: debit,
                available,
            });
        }

        balances.entry(debit_asset.to_string()).or_default().free -= debit;
        balances.entry(credit_asset.to_string()).or_default().free += credit;
        Ok(())
    }

    fn rest(
        &self,
        request: &OrderRequest,
        base: &str,
        quote: &str,
        price: Decimal,
    ) -> Result<OrderExecution, ExchangeError> {
        let (asset, amount) = match request.side {
            Side::Buy => (quote, request.quantity * price),
            Side::Sell => (base, request.quantity),
        };

        {
            let mut balances = lock(&self.balances);
            let balance = balances.entry(asset.to_string()).or_default();
            if balance.free < amount {
                return Err(ExchangeError::InsufficientBalance {
                    asset: asset.to_string(),
                    required: amount,
                    available: balance.free,
                });
            }
            balance.free -= amount;
            balance.locked += amount;
        }

        let order_id = Uuid::new_v4().to_string();
        let order = OpenOrder {
            order_id: order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            price: Some(price),
        };
        lock(&self.orders).insert(order_id.clone(), order);
        debug!(order_id = %order_id, "paper order resting: {}", request);

        Ok(OrderExecution {
            order_id,
            filled_quantity: Decimal::ZERO,
            avg_price: None,
        })
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeGateway for PaperExchange {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        lock(&self.tickers)
            .get(symbol)
            .cloned()
            .ok_or_else(|| ExchangeError::InvalidSymbol(symbol.to_string()))
    }

    async fn get_balance(&self) -> Result<Balances, ExchangeError> {
        Ok(Balances(lock(&self.balances).clone()))
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderExecution, ExchangeError> {
        let (base, quote) = split_symbol(&request.symbol)?;
        if request.quantity <= Decimal::ZERO {
            return Err(ExchangeError::OrderRejected(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }

        let ticker = self.get_ticker(&request.symbol).await?;
        let touch = match request.side {
            Side::Buy => ticker.ask,
            Side::Sell => ticker.bid,
        };

        let fill_price = match request.order_type {
            OrderType::Market => touch,
            OrderType::Limit => {
                let limit = request.price.ok_or_else(|| {
                    ExchangeError::OrderRejected("limit order without price".to_string())
                })?;
                let marketable = match request.side {
                    Side::Buy => limit >= touch,
                    Side::Sell => limit <= touch,
                };
                if !marketable {
                    return self.rest(&request, base, quote, limit);
                }
                touch
            }
        };

        self.settle(request.side, base, quote, request.quantity, fill_price)?;

        let order_id = Uuid::new_v4().to_string();
        debug!(order_id = %order_id, price = %fill_price, "paper order filled: {}", request);

        Ok(OrderExecution {
            order_id,
            filled_quantity: request.quantity,
            avg_price: Some(fill_price),
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        let order = lock(&self.orders)
            .remove(order_id)
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;

        let (base, quote) = split_symbol(&order.symbol)?;
        let price = order.price.unwrap_or_default();
        let remaining = order.remaining_quantity();
        let (asset, amount) = match order.side {
            Side::Buy => (quote, remaining * price),
            Side::Sell => (base, remaining),
        };

        let mut balances = lock(&self.balances);
        let balance = balances.entry(asset.to_string()).or_default();
        balance.locked -= amount;
        balance.free += amount;
        Ok(())
    }

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ExchangeError> {
        let orders = lock(&self.orders);
        Ok(orders
            .values()
            .filter(|o| symbol.map(|s| o.symbol == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "Paper Exchange"
    }
}

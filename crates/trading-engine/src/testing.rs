//! Fault-injecting gateway and store wrappers for engine tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trading_core::error::{ExchangeError, StoreError};
use trading_core::traits::{ExchangeGateway, PersistenceStore};
use trading_core::types::{
    Balances, LogEntry, NewStrategy, OpenOrder, OrderExecution, OrderRequest, StrategyId,
    StrategyRecord, StrategyStatus, Ticker, Trade,
};
use trading_exchange::PaperExchange;
use trading_store::MemoryStore;

pub const SYMBOL: &str = "BTC/USDT";

/// Paper exchange with scripted failures and latency.
pub struct FaultyExchange {
    pub paper: PaperExchange,
    ticker_errors: Mutex<VecDeque<ExchangeError>>,
    order_errors: Mutex<VecDeque<ExchangeError>>,
    /// Returned after the order was executed on the paper book
    late_order_errors: Mutex<VecDeque<ExchangeError>>,
    ticker_panics: AtomicBool,
    ticker_delay: Mutex<Option<Duration>>,
    placed: Mutex<Vec<String>>,
    ticker_calls: AtomicUsize,
    order_calls: AtomicUsize,
}

impl FaultyExchange {
    pub fn new(paper: PaperExchange) -> Self {
        Self {
            paper,
            ticker_errors: Mutex::new(VecDeque::new()),
            order_errors: Mutex::new(VecDeque::new()),
            late_order_errors: Mutex::new(VecDeque::new()),
            ticker_panics: AtomicBool::new(false),
            ticker_delay: Mutex::new(None),
            placed: Mutex::new(Vec::new()),
            ticker_calls: AtomicUsize::new(0),
            order_calls: AtomicUsize::new(0),
        }
    }

    /// Funded exchange quoting `SYMBOL` at `price`.
    pub fn with_price(price: Decimal) -> Self {
        Self::new(
            PaperExchange::new()
                .with_balance("USDT", dec!(1_000_000))
                .with_balance("BTC", dec!(10))
                .with_price(SYMBOL, price),
        )
    }

    pub fn fail_ticker(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.ticker_errors.lock().unwrap().extend(errors);
    }

    pub fn fail_orders(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.order_errors.lock().unwrap().extend(errors);
    }

    /// Execute the next orders, then report these errors instead of the
    /// confirmation.
    pub fn fail_orders_after_execution(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.late_order_errors.lock().unwrap().extend(errors);
    }

    pub fn panic_on_ticker(&self) {
        self.ticker_panics.store(true, Ordering::SeqCst);
    }

    pub fn set_ticker_delay(&self, delay: Duration) {
        *self.ticker_delay.lock().unwrap() = Some(delay);
    }

    /// Order ids returned by successful `place_order` calls.
    pub fn placed_order_ids(&self) -> Vec<String> {
        self.placed.lock().unwrap().clone()
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeGateway for FaultyExchange {
    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.ticker_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.ticker_panics.load(Ordering::SeqCst) {
            panic!("ticker feed corrupted");
        }
        let scripted = self.ticker_errors.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        self.paper.get_ticker(symbol).await
    }

    async fn get_balance(&self) -> Result<Balances, ExchangeError> {
        self.paper.get_balance().await
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderExecution, ExchangeError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.order_errors.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        let execution = self.paper.place_order(request).await?;
        let late = self.late_order_errors.lock().unwrap().pop_front();
        if let Some(err) = late {
            return Err(err);
        }
        self.placed.lock().unwrap().push(execution.order_id.clone());
        Ok(execution)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), ExchangeError> {
        self.paper.cancel_order(order_id).await
    }

    async fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, ExchangeError> {
        self.paper.list_open_orders(symbol).await
    }

    fn name(&self) -> &str {
        self.paper.name()
    }
}

/// Memory store that counts calls and fails writes on request.
pub struct FlakyStore {
    inner: MemoryStore,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing_trade_writes: AtomicUsize,
    logs_failing: AtomicBool,
    status_writes_failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            failing_trade_writes: AtomicUsize::new(0),
            logs_failing: AtomicBool::new(false),
            status_writes_failing: AtomicBool::new(false),
        }
    }

    pub fn fail_next_trade_writes(&self, count: usize) {
        self.failing_trade_writes.store(count, Ordering::SeqCst);
    }

    pub fn set_logs_failing(&self, failing: bool) {
        self.logs_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_status_writes_failing(&self, failing: bool) {
        self.status_writes_failing.store(failing, Ordering::SeqCst);
    }

    /// Reads plus writes of any table.
    pub fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }

    pub fn log_count(&self) -> usize {
        self.inner.log_count()
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn take_trade_failure(&self) -> bool {
        self.failing_trade_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PersistenceStore for FlakyStore {
    async fn load_strategies(&self) -> Result<Vec<StrategyRecord>, StoreError> {
        self.read();
        self.inner.load_strategies().await
    }

    async fn get_strategy(&self, id: StrategyId) -> Result<Option<StrategyRecord>, StoreError> {
        self.read();
        self.inner.get_strategy(id).await
    }

    async fn create_strategy(&self, strategy: NewStrategy) -> Result<StrategyId, StoreError> {
        self.write();
        self.inner.create_strategy(strategy).await
    }

    async fn save_strategy_status(
        &self,
        id: StrategyId,
        status: StrategyStatus,
    ) -> Result<(), StoreError> {
        self.write();
        if self.status_writes_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("status table locked".into()));
        }
        self.inner.save_strategy_status(id, status).await
    }

    async fn append_trade(&self, trade: Trade) -> Result<(), StoreError> {
        self.write();
        if self.take_trade_failure() {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.append_trade(trade).await
    }

    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.write();
        if self.logs_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.append_log(entry).await
    }

    async fn get_trades(
        &self,
        strategy_id: Option<StrategyId>,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError> {
        self.read();
        self.inner.get_trades(strategy_id, limit).await
    }

    async fn get_logs(
        &self,
        strategy_id: Option<StrategyId>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, StoreError> {
        self.read();
        self.inner.get_logs(strategy_id, limit).await
    }
}

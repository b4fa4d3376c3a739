//! Execution loop of a single running strategy.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use trading_core::error::{ErrorClass, ExchangeError};
use trading_core::traits::{ExchangeGateway, PersistenceStore, TradingAlgorithm};
use trading_core::types::{
    LogLevel, MarketSnapshot, OrderExecution, OrderIntent, StrategyId, StrategyStatus, Ticker,
    Trade,
};

use crate::config::EngineConfig;
use crate::handle::{WorkerProbe, WorkerState};
use crate::journal::Journal;

/// How a worker's run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// Cancellation was observed at a checkpoint.
    Stopped,
    /// A structural error ended the run.
    Failed { cause: String },
}

/// Why a cycle ended early.
enum CycleError {
    /// Already logged; the worker carries on with the next cycle.
    Skipped,
    /// An order submission may have been accepted; already logged.
    Unconfirmed,
    /// Cancellation observed while backing off.
    Cancelled,
    /// Fatal to the run.
    Fatal(String),
}

/// Runs one strategy until it is cancelled or fails.
///
/// Each cycle fetches a market snapshot, lets the algorithm decide, places
/// the resulting orders and then waits for the poll interval. Cancellation
/// is observed at the top of a cycle, during the wait and during retry
/// backoff, never between submitting an order and handling its response.
pub struct StrategyWorker {
    strategy_id: StrategyId,
    generation: u64,
    algorithm: Box<dyn TradingAlgorithm>,
    exchange: Arc<dyn ExchangeGateway>,
    journal: Journal,
    config: EngineConfig,
    cancel: watch::Receiver<bool>,
    probe: Arc<WorkerProbe>,
    poll_interval: Duration,
    /// Orders this worker placed that may still rest on the book
    resting: HashSet<String>,
}

impl StrategyWorker {
    pub fn new(
        strategy_id: StrategyId,
        generation: u64,
        algorithm: Box<dyn TradingAlgorithm>,
        exchange: Arc<dyn ExchangeGateway>,
        store: Arc<dyn PersistenceStore>,
        config: EngineConfig,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let poll_interval = algorithm
            .poll_interval()
            .unwrap_or(config.default_poll_interval);
        Self {
            strategy_id,
            generation,
            algorithm,
            exchange,
            journal: Journal::new(Some(strategy_id), store),
            config,
            cancel,
            probe: Arc::new(WorkerProbe::new()),
            poll_interval,
            resting: HashSet::new(),
        }
    }

    /// Shared probe the manager reads heartbeat and state from.
    pub fn probe(&self) -> Arc<WorkerProbe> {
        self.probe.clone()
    }

    /// Run the loop to completion.
    pub async fn run(mut self) -> WorkerOutcome {
        info!(
            strategy_id = %self.strategy_id,
            generation = self.generation,
            algorithm = self.algorithm.name(),
            symbol = self.algorithm.symbol(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "Worker started"
        );

        let outcome = loop {
            if self.is_cancelled() {
                break WorkerOutcome::Stopped;
            }
            self.probe.beat(WorkerState::Evaluating);

            let result = self.cycle().await;
            self.journal.flush().await;

            match result {
                Ok(()) | Err(CycleError::Skipped) | Err(CycleError::Unconfirmed) => {}
                Err(CycleError::Cancelled) => break WorkerOutcome::Stopped,
                Err(CycleError::Fatal(cause)) => break WorkerOutcome::Failed { cause },
            }

            self.probe.set_state(WorkerState::Waiting);
            if self.sleep_or_cancel(self.poll_interval).await {
                break WorkerOutcome::Stopped;
            }
        };

        match &outcome {
            WorkerOutcome::Stopped => {
                if self.config.cancel_open_orders_on_stop {
                    self.cancel_resting_orders().await;
                }
                info!(strategy_id = %self.strategy_id, generation = self.generation, "Worker stopped");
            }
            WorkerOutcome::Failed { cause } => {
                self.probe.set_status(StrategyStatus::Error);
                error!(strategy_id = %self.strategy_id, generation = self.generation, cause = %cause, "Worker failed");
            }
        }

        self.journal.drain().await;
        self.probe.set_state(WorkerState::Terminated);
        outcome
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Sleep for `duration`; returns true if cancellation arrived first.
    async fn sleep_or_cancel(&mut self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            changed = self.cancel.changed() => changed.is_err() || *self.cancel.borrow(),
        }
    }

    async fn cycle(&mut self) -> Result<(), CycleError> {
        let symbol = self.algorithm.symbol().to_string();
        let exchange = self.exchange.clone();

        let ticker = self
            .call("get_ticker", false, || {
                let exchange = exchange.clone();
                let symbol = symbol.clone();
                async move { exchange.get_ticker(&symbol).await }
            })
            .await?;
        let balances = self
            .call("get_balance", false, || {
                let exchange = exchange.clone();
                async move { exchange.get_balance().await }
            })
            .await?;
        let open_orders = self
            .call("list_open_orders", false, || {
                let exchange = exchange.clone();
                let symbol = symbol.clone();
                async move { exchange.list_open_orders(Some(&symbol)).await }
            })
            .await?;

        self.resting
            .retain(|id| open_orders.iter().any(|o| &o.order_id == id));

        let snapshot = MarketSnapshot {
            ticker,
            balances,
            open_orders,
            at: Utc::now(),
        };
        let intents = self.algorithm.evaluate(&snapshot);
        if intents.is_empty() {
            debug!(strategy_id = %self.strategy_id, last = %snapshot.ticker.last, "No action");
            return Ok(());
        }

        self.probe.set_state(WorkerState::Acting);
        for intent in intents {
            self.act(intent, &snapshot.ticker).await?;
        }
        Ok(())
    }

    async fn act(&mut self, intent: OrderIntent, ticker: &Ticker) -> Result<(), CycleError> {
        let exchange = self.exchange.clone();
        let request = intent.request.clone();
        let execution = match self
            .call("place_order", true, || {
                let exchange = exchange.clone();
                let request = request.clone();
                async move { exchange.place_order(request).await }
            })
            .await
        {
            Ok(execution) => execution,
            Err(CycleError::Unconfirmed) => {
                self.algorithm.on_unconfirmed(&intent, Utc::now());
                return Err(CycleError::Unconfirmed);
            }
            Err(e) => return Err(e),
        };

        if !execution.is_filled() {
            info!(strategy_id = %self.strategy_id, order_id = %execution.order_id, "Order resting");
            self.journal
                .log(
                    LogLevel::Info,
                    format!("Order {} placed, resting: {}", execution.order_id, intent.request),
                )
                .await;
            self.resting.insert(execution.order_id);
            return Ok(());
        }

        if execution.filled_quantity < intent.request.quantity {
            self.resting.insert(execution.order_id.clone());
        }

        let price = execution
            .avg_price
            .filter(|p| *p > Decimal::ZERO)
            .or(intent.request.price)
            .unwrap_or(ticker.last);
        let execution = OrderExecution {
            avg_price: Some(price),
            ..execution
        };

        let timestamp = Utc::now();
        let pnl = self.algorithm.on_fill(&intent, &execution, timestamp);
        let trade = Trade {
            strategy_id: self.strategy_id,
            order_id: execution.order_id.clone(),
            symbol: intent.request.symbol.clone(),
            side: intent.request.side,
            quantity: execution.filled_quantity,
            price,
            pnl,
            timestamp,
        };

        info!(
            strategy_id = %self.strategy_id,
            order_id = %trade.order_id,
            side = %trade.side,
            quantity = %trade.quantity,
            price = %trade.price,
            "Order filled"
        );

        let mut message = format!(
            "Executed {} {} {} @ {} ({})",
            trade.side, trade.quantity, trade.symbol, trade.price, intent.reason
        );
        if let Some(pnl) = pnl {
            message.push_str(&format!(", pnl {}", pnl.round_dp(8)));
        }
        self.journal.record_trade(trade).await;
        self.journal.log(LogLevel::Info, message).await;
        Ok(())
    }

    /// Invoke an exchange operation under the retry policy.
    ///
    /// With `resubmit_only`, transient failures are only retried when the
    /// error guarantees the request was not accepted.
    async fn call<T, F, Fut>(
        &mut self,
        operation: &'static str,
        resubmit_only: bool,
        mut request: F,
    ) -> Result<T, CycleError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let policy = self.config.retry.clone();
        let mut backoff = policy.backoff();
        let mut attempt = 1;

        loop {
            let err = match request().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.class() == ErrorClass::Structural {
                return Err(CycleError::Fatal(format!("{} failed: {}", operation, err)));
            }

            if resubmit_only && !err.is_safe_to_resubmit() {
                warn!(strategy_id = %self.strategy_id, operation, error = %err, "Outcome unknown, not resubmitting");
                self.journal
                    .log(
                        LogLevel::Warning,
                        format!(
                            "{} outcome unknown ({}); not resubmitting, will reconcile next cycle",
                            operation, err
                        ),
                    )
                    .await;
                return Err(CycleError::Unconfirmed);
            }

            if attempt >= policy.max_attempts {
                warn!(strategy_id = %self.strategy_id, operation, attempt, error = %err, "Retries exhausted");
                self.journal
                    .log(
                        LogLevel::Warning,
                        format!("{} failed after {} attempts: {}", operation, attempt, err),
                    )
                    .await;
                return Err(CycleError::Skipped);
            }

            let delay = policy.delay_after(&mut backoff, &err);
            warn!(
                strategy_id = %self.strategy_id,
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient exchange error, retrying"
            );
            self.journal
                .log(
                    LogLevel::Warning,
                    format!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, policy.max_attempts, err, delay
                    ),
                )
                .await;

            if self.sleep_or_cancel(delay).await {
                return Err(CycleError::Cancelled);
            }
            attempt += 1;
        }
    }

    /// Cancel orders this worker placed that are still open.
    async fn cancel_resting_orders(&mut self) {
        if self.resting.is_empty() {
            return;
        }

        let symbol = self.algorithm.symbol().to_string();
        let open = match self.exchange.list_open_orders(Some(&symbol)).await {
            Ok(open) => open,
            Err(e) => {
                warn!(strategy_id = %self.strategy_id, error = %e, "Could not list open orders on stop");
                self.journal
                    .log(LogLevel::Warning, format!("Could not list open orders on stop: {}", e))
                    .await;
                return;
            }
        };

        let mut canceled = 0;
        for order in open.iter().filter(|o| self.resting.contains(&o.order_id)) {
            match self.exchange.cancel_order(&order.order_id).await {
                Ok(()) => canceled += 1,
                Err(e) => {
                    warn!(strategy_id = %self.strategy_id, order_id = %order.order_id, error = %e, "Cancel failed");
                    self.journal
                        .log(
                            LogLevel::Warning,
                            format!("Failed to cancel order {}: {}", order.order_id, e),
                        )
                        .await;
                }
            }
        }
        self.resting.clear();

        if canceled > 0 {
            self.journal
                .log(LogLevel::Info, format!("Canceled {} open orders on stop", canceled))
                .await;
        }
    }
}

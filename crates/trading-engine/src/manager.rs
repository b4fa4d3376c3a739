//! Strategy lifecycle management.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use trading_core::error::{StoreError, TradingError, TradingResult};
use trading_core::traits::{ExchangeGateway, PersistenceStore};
use trading_core::types::{
    LogEntry, LogLevel, NewStrategy, StrategyId, StrategyKind, StrategyStatus, Trade,
};
use trading_strategies::StrategyRegistry;

use crate::config::EngineConfig;
use crate::gateway::TimedExchange;
use crate::handle::{WorkerHandle, WorkerInfo, WorkerState};
use crate::journal::Journal;
use crate::worker::{StrategyWorker, WorkerOutcome};

/// Result of [`StrategyManager::stop_all_strategies`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    /// Workers that acknowledged the stop
    pub stopped: Vec<StrategyId>,
    /// Workers that missed the deadline and were detached
    pub abandoned: Vec<StrategyId>,
}

enum StopResult {
    NotRunning,
    Acknowledged,
    Detached,
}

struct Inner {
    exchange: Arc<dyn ExchangeGateway>,
    store: Arc<dyn PersistenceStore>,
    registry: StrategyRegistry,
    config: EngineConfig,
    journal: Journal,
    /// Serializes lifecycle operations on one id
    locks: Mutex<HashMap<StrategyId, Arc<tokio::sync::Mutex<()>>>>,
    workers: RwLock<HashMap<StrategyId, WorkerHandle>>,
    /// Last persisted status of every known strategy
    statuses: RwLock<HashMap<StrategyId, StrategyStatus>>,
    generation: AtomicU64,
}

/// Owns strategy lifecycle and the registry of running workers.
///
/// The manager is the only writer of strategy status. Lifecycle operations
/// on the same id are serialized; operations on different ids run
/// concurrently. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct StrategyManager {
    inner: Arc<Inner>,
}

impl StrategyManager {
    /// Create a manager. Every exchange request is bounded by
    /// `config.request_timeout`.
    pub fn new(
        exchange: Arc<dyn ExchangeGateway>,
        store: Arc<dyn PersistenceStore>,
        config: EngineConfig,
    ) -> Self {
        let exchange: Arc<dyn ExchangeGateway> =
            Arc::new(TimedExchange::new(exchange, config.request_timeout));
        Self {
            inner: Arc::new(Inner {
                exchange,
                journal: Journal::new(None, store.clone()),
                store,
                registry: StrategyRegistry::new(),
                config,
                locks: Mutex::new(HashMap::new()),
                workers: RwLock::new(HashMap::new()),
                statuses: RwLock::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Lifecycle lock of one id. Locks nobody holds are pruned.
    fn lock_for(&self, id: StrategyId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.locks.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(lock) = locks.get(&id) {
            return lock.clone();
        }
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(id).or_default().clone()
    }

    fn workers(&self) -> RwLockReadGuard<'_, HashMap<StrategyId, WorkerHandle>> {
        self.inner.workers.read().unwrap_or_else(|p| p.into_inner())
    }

    fn workers_mut(&self) -> RwLockWriteGuard<'_, HashMap<StrategyId, WorkerHandle>> {
        self.inner.workers.write().unwrap_or_else(|p| p.into_inner())
    }

    fn cached_status(&self, id: StrategyId) -> Option<StrategyStatus> {
        let statuses = self.inner.statuses.read().unwrap_or_else(|p| p.into_inner());
        statuses.get(&id).copied()
    }

    fn cache_status(&self, id: StrategyId, status: StrategyStatus) {
        let mut statuses = self.inner.statuses.write().unwrap_or_else(|p| p.into_inner());
        statuses.insert(id, status);
    }

    async fn log(&self, strategy_id: StrategyId, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(Some(strategy_id), level, message);
        if let Err(e) = self.inner.store.append_log(entry).await {
            warn!(strategy_id = %strategy_id, error = %e, "Failed to persist log entry");
        }
    }

    async fn persist_status(&self, id: StrategyId, status: StrategyStatus) -> Result<(), StoreError> {
        self.inner.store.save_strategy_status(id, status).await?;
        self.cache_status(id, status);
        Ok(())
    }

    /// Persist a terminal status. Failures are reported, never returned:
    /// the worker is already gone.
    async fn settle_status(&self, id: StrategyId, status: StrategyStatus) {
        if let Err(e) = self.persist_status(id, status).await {
            error!(strategy_id = %id, status = %status, error = %e, "Failed to persist strategy status");
            self.cache_status(id, status);
        }
    }

    async fn is_known(&self, id: StrategyId) -> TradingResult<bool> {
        if self.cached_status(id).is_some() {
            return Ok(true);
        }
        Ok(self.inner.store.get_strategy(id).await?.is_some())
    }

    /// Load persisted strategies into the status view.
    ///
    /// A strategy persisted as `running` has no worker after a restart, so
    /// it is reset to `stopped`. Returns the number of strategies loaded.
    pub async fn restore(&self) -> TradingResult<usize> {
        let records = self.inner.store.load_strategies().await?;
        let count = records.len();

        for record in records {
            let id = record.id();
            let lock = self.lock_for(id);
            let _guard = lock.lock().await;

            let live = self.workers().contains_key(&id);
            if record.status == StrategyStatus::Running && !live {
                warn!(strategy_id = %id, name = %record.definition.name, "Resetting stale running status");
                self.settle_status(id, StrategyStatus::Stopped).await;
                self.log(
                    id,
                    LogLevel::Warning,
                    "Strategy was running when the engine last shut down; reset to stopped",
                )
                .await;
            } else if !live {
                self.cache_status(id, record.status);
            }
        }

        info!(count, "Strategies restored");
        Ok(count)
    }

    /// Validate and persist a new strategy with status `stopped`.
    pub async fn create_strategy(
        &self,
        name: &str,
        kind: &str,
        config: serde_json::Value,
    ) -> TradingResult<StrategyId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TradingError::Validation("Strategy name must not be empty".into()));
        }
        let kind: StrategyKind = kind.parse()?;
        self.inner.registry.validate(kind.as_str(), &config)?;

        let id = self
            .inner
            .store
            .create_strategy(NewStrategy {
                name: name.to_string(),
                kind,
                config,
            })
            .await?;
        self.cache_status(id, StrategyStatus::Stopped);

        info!(strategy_id = %id, name, kind = %kind, "Strategy created");
        Ok(id)
    }

    /// Start a worker for the strategy.
    ///
    /// Returns `Ok(false)` if a worker is already running, or if the
    /// strategy could not be built, in which case its status becomes
    /// `error`.
    pub async fn start_strategy(&self, id: StrategyId) -> TradingResult<bool> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        if self.workers().contains_key(&id) {
            debug!(strategy_id = %id, "Start ignored, worker already running");
            return Ok(false);
        }

        let record = self
            .inner
            .store
            .get_strategy(id)
            .await?
            .ok_or(TradingError::NotFound(id))?;
        let definition = &record.definition;

        let algorithm = match self
            .inner
            .registry
            .create(definition.kind.as_str(), &definition.config)
        {
            Ok(algorithm) => algorithm,
            Err(e) => {
                warn!(strategy_id = %id, error = %e, "Strategy could not be initialized");
                self.settle_status(id, StrategyStatus::Error).await;
                self.log(id, LogLevel::Error, format!("Failed to start strategy: {}", e))
                    .await;
                return Ok(false);
            }
        };

        self.persist_status(id, StrategyStatus::Running).await?;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let worker = StrategyWorker::new(
            id,
            generation,
            algorithm,
            self.inner.exchange.clone(),
            self.inner.store.clone(),
            self.inner.config.clone(),
            cancel_rx,
        );
        let probe = worker.probe();

        let manager = self.clone();
        let supervised = probe.clone();
        let task = tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(worker.run()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(panic) => {
                    let cause = format!("worker panicked: {}", panic_message(panic.as_ref()));
                    error!(strategy_id = %id, generation, cause = %cause, "Worker panicked");
                    supervised.set_status(StrategyStatus::Error);
                    supervised.set_state(WorkerState::Terminated);
                    WorkerOutcome::Failed { cause }
                }
            };
            // The receiver is gone once the worker was detached.
            let _ = outcome_tx.send(outcome.clone());
            manager.reap(id, generation, outcome).await;
        });

        self.workers_mut().insert(
            id,
            WorkerHandle {
                strategy_id: id,
                generation,
                cancel: cancel_tx,
                probe,
                outcome: outcome_rx,
                task,
            },
        );

        info!(strategy_id = %id, generation, name = %definition.name, "Strategy started");
        self.log(id, LogLevel::Info, format!("Strategy '{}' started", definition.name))
            .await;
        Ok(true)
    }

    /// Called by a worker task after its run ended on its own.
    async fn reap(&self, id: StrategyId, generation: u64, outcome: WorkerOutcome) {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let handle = {
            let mut workers = self.workers_mut();
            match workers.get(&id) {
                Some(handle) if handle.generation == generation => workers.remove(&id),
                _ => None,
            }
        };

        if handle.is_none() {
            debug!(strategy_id = %id, generation, "Ignoring report from a retired worker");
            return;
        }
        self.finalize(id, &outcome).await;
    }

    async fn finalize(&self, id: StrategyId, outcome: &WorkerOutcome) {
        match outcome {
            WorkerOutcome::Stopped => {
                self.settle_status(id, StrategyStatus::Stopped).await;
                self.log(id, LogLevel::Info, "Strategy stopped").await;
            }
            WorkerOutcome::Failed { cause } => {
                error!(strategy_id = %id, cause = %cause, "Strategy failed");
                self.settle_status(id, StrategyStatus::Error).await;
                self.log(id, LogLevel::Error, format!("Strategy failed: {}", cause))
                    .await;
            }
        }
    }

    /// Stop the strategy's worker, waiting up to the stop grace period.
    ///
    /// A worker that does not acknowledge in time is detached and the
    /// strategy is still marked `stopped`.
    pub async fn stop_strategy(&self, id: StrategyId) -> TradingResult<bool> {
        let deadline = Instant::now() + self.inner.config.stop_grace;
        self.stop_until(id, deadline).await?;
        Ok(true)
    }

    async fn stop_until(&self, id: StrategyId, deadline: Instant) -> TradingResult<StopResult> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let handle = self.workers_mut().remove(&id);
        let Some(handle) = handle else {
            if !self.is_known(id).await? {
                return Err(TradingError::NotFound(id));
            }
            return Ok(StopResult::NotRunning);
        };

        handle.cancel();
        let generation = handle.generation;

        match tokio::time::timeout_at(deadline, handle.outcome).await {
            Ok(Ok(outcome)) => {
                self.finalize(id, &outcome).await;
                Ok(StopResult::Acknowledged)
            }
            Ok(Err(_)) => {
                let cause = match handle.task.await {
                    Err(e) if e.is_panic() => "worker panicked".to_string(),
                    _ => "worker exited without reporting".to_string(),
                };
                self.finalize(id, &WorkerOutcome::Failed { cause }).await;
                Ok(StopResult::Acknowledged)
            }
            Err(_) => {
                warn!(strategy_id = %id, generation, "Worker did not stop in time, detached");
                self.settle_status(id, StrategyStatus::Stopped).await;
                self.log(
                    id,
                    LogLevel::Warning,
                    "Worker did not acknowledge stop in time and was detached",
                )
                .await;
                Ok(StopResult::Detached)
            }
        }
    }

    /// Stop every running worker concurrently under one deadline.
    pub async fn stop_all_strategies(&self) -> ShutdownReport {
        let ids: Vec<StrategyId> = self.workers().keys().copied().collect();
        let deadline = Instant::now() + self.inner.config.shutdown_deadline;
        info!(count = ids.len(), "Stopping all strategies");

        let results = join_all(ids.into_iter().map(|id| async move {
            (id, self.stop_until(id, deadline).await)
        }))
        .await;

        let mut report = ShutdownReport::default();
        for (id, result) in results {
            match result {
                Ok(StopResult::Acknowledged) => report.stopped.push(id),
                Ok(StopResult::Detached) => report.abandoned.push(id),
                Ok(StopResult::NotRunning) => {}
                Err(e) => {
                    error!(strategy_id = %id, error = %e, "Failed to stop strategy");
                    report.abandoned.push(id);
                }
            }
        }
        report.stopped.sort();
        report.abandoned.sort();

        if !report.abandoned.is_empty() {
            self.inner
                .journal
                .log(
                    LogLevel::Warning,
                    format!("Shutdown abandoned {} workers", report.abandoned.len()),
                )
                .await;
        }
        info!(stopped = report.stopped.len(), abandoned = report.abandoned.len(), "Shutdown complete");
        report
    }

    /// Current status: the live worker's view if one runs, else the last
    /// persisted status.
    pub async fn get_strategy_status(&self, id: StrategyId) -> TradingResult<StrategyStatus> {
        let live = self.workers().get(&id).map(|handle| handle.probe.status());
        if let Some(status) = live.or_else(|| self.cached_status(id)) {
            return Ok(status);
        }

        let record = self
            .inner
            .store
            .get_strategy(id)
            .await?
            .ok_or(TradingError::NotFound(id))?;
        self.cache_status(id, record.status);
        Ok(record.status)
    }

    /// Status of every known strategy, ordered by id.
    pub fn statuses(&self) -> Vec<(StrategyId, StrategyStatus)> {
        let mut statuses: HashMap<StrategyId, StrategyStatus> = self
            .inner
            .statuses
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        for (id, handle) in self.workers().iter() {
            statuses.insert(*id, handle.probe.status());
        }

        let mut statuses: Vec<_> = statuses.into_iter().collect();
        statuses.sort_by_key(|(id, _)| *id);
        statuses
    }

    /// Liveness details of the strategy's worker, if one runs.
    pub fn worker_info(&self, id: StrategyId) -> Option<WorkerInfo> {
        self.workers().get(&id).map(WorkerHandle::info)
    }

    /// Number of live workers.
    pub fn active_count(&self) -> usize {
        self.workers().len()
    }

    /// Most recent trades first.
    pub async fn trades(&self, strategy_id: Option<StrategyId>, limit: usize) -> TradingResult<Vec<Trade>> {
        Ok(self.inner.store.get_trades(strategy_id, limit).await?)
    }

    /// Most recent log entries first.
    pub async fn logs(&self, strategy_id: Option<StrategyId>, limit: usize) -> TradingResult<Vec<LogEntry>> {
        Ok(self.inner.store.get_logs(strategy_id, limit).await?)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FaultyExchange, FlakyStore};
    use crate::RetryPolicy;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use trading_core::error::ExchangeError;

    fn config() -> EngineConfig {
        EngineConfig {
            stop_grace: Duration::from_secs(1),
            shutdown_deadline: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            default_poll_interval: Duration::from_millis(10),
            cancel_open_orders_on_stop: true,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                jitter_factor: 0.1,
            },
        }
    }

    struct Fixture {
        manager: StrategyManager,
        exchange: Arc<FaultyExchange>,
        store: Arc<FlakyStore>,
    }

    fn fixture(exchange: FaultyExchange, config: EngineConfig) -> Fixture {
        let exchange = Arc::new(exchange);
        let store = Arc::new(FlakyStore::new());
        let manager = StrategyManager::new(exchange.clone(), store.clone(), config);
        Fixture {
            manager,
            exchange,
            store,
        }
    }

    fn grid_config() -> serde_json::Value {
        serde_json::json!({"lower": 20000, "upper": 30000, "levels": 5})
    }

    fn dca_config() -> serde_json::Value {
        serde_json::json!({"quote_amount": 100, "interval_secs": 1})
    }

    async fn has_log(manager: &StrategyManager, id: StrategyId, level: LogLevel, text: &str) -> bool {
        manager
            .logs(Some(id), 1000)
            .await
            .unwrap()
            .iter()
            .any(|l| l.level == level && l.message.contains(text))
    }

    #[tokio::test]
    async fn test_grid_lifecycle() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());

        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Stopped);

        assert!(f.manager.start_strategy(id).await.unwrap());
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Running);
        assert!(f.manager.worker_info(id).is_some());

        assert!(f.manager.stop_strategy(id).await.unwrap());
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Stopped);
        assert!(f.manager.worker_info(id).is_none());
        assert_eq!(f.manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_start_unknown_strategy() {
        let f = fixture(FaultyExchange::with_price(dec!(100)), config());

        let err = f.manager.start_strategy(StrategyId(42)).await.unwrap_err();
        assert!(matches!(err, TradingError::NotFound(StrategyId(42))));
        assert!(matches!(
            f.manager.stop_strategy(StrategyId(42)).await,
            Err(TradingError::NotFound(_))
        ));
        assert!(matches!(
            f.manager.get_strategy_status(StrategyId(42)).await,
            Err(TradingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_validation() {
        let f = fixture(FaultyExchange::with_price(dec!(100)), config());

        let cases = [
            ("  ", "grid", grid_config()),
            ("g", "scalper", grid_config()),
            ("g", "grid", serde_json::json!({"lower": 30000, "upper": 20000, "levels": 5})),
            ("g", "grid", serde_json::json!({"lower": 20000, "upper": 30000})),
            ("d", "dca", serde_json::json!({})),
            ("m", "momentum", serde_json::json!({"lookback": 1})),
            ("d", "dca", serde_json::json!({"quote_amount": "79228162514264337593543950335"})),
        ];
        for (name, kind, config) in cases {
            let result = f.manager.create_strategy(name, kind, config).await;
            assert!(matches!(result, Err(TradingError::Validation(_))), "{} {}", name, kind);
        }

        assert_eq!(f.store.calls(), 0);
        assert!(f.manager.statuses().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_start_spawns_one_worker() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();

        let starts = (0..8).map(|_| {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.start_strategy(id).await.unwrap() })
        });
        let results: Vec<bool> = join_all(starts).await.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(results.iter().filter(|started| **started).count(), 1);
        assert_eq!(f.manager.active_count(), 1);
        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_idempotent_start_touches_nothing() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();
        assert!(f.manager.start_strategy(id).await.unwrap());
        let generation = f.manager.worker_info(id).unwrap().generation;

        // Stall the worker so it makes no store calls of its own.
        f.exchange.set_ticker_delay(Duration::from_millis(200));
        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = f.store.calls();

        assert!(!f.manager.start_strategy(id).await.unwrap());
        assert_eq!(f.store.calls(), calls);
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Running);
        assert_eq!(f.manager.worker_info(id).unwrap().generation, generation);

        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_then_start_leaves_no_ghost() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();

        for _ in 0..5 {
            assert!(f.manager.start_strategy(id).await.unwrap());
            assert!(f.manager.stop_strategy(id).await.unwrap());
        }
        assert!(f.manager.start_strategy(id).await.unwrap());
        let generation = f.manager.worker_info(id).unwrap().generation;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Running);
        assert_eq!(f.manager.worker_info(id).unwrap().generation, generation);
        assert_eq!(f.manager.active_count(), 1);

        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_detached_worker_cannot_overwrite_new_run() {
        let config = EngineConfig {
            stop_grace: Duration::from_millis(30),
            ..config()
        };
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config);
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();

        f.exchange.set_ticker_delay(Duration::from_millis(300));
        assert!(f.manager.start_strategy(id).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(f.manager.stop_strategy(id).await.unwrap());
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Stopped);
        assert!(has_log(&f.manager, id, LogLevel::Warning, "detached").await);

        assert!(f.manager.start_strategy(id).await.unwrap());
        let generation = f.manager.worker_info(id).unwrap().generation;

        // Let the detached worker wake up and terminate.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Running);
        assert_eq!(f.manager.worker_info(id).unwrap().generation, generation);

        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_errors_below_ceiling() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        f.exchange.fail_ticker([
            ExchangeError::Network("connection reset".into()),
            ExchangeError::ServiceUnavailable("503".into()),
        ]);
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();

        f.manager.start_strategy(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Running);
        assert!(has_log(&f.manager, id, LogLevel::Warning, "retrying").await);
        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_errors_above_ceiling() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        f.exchange
            .fail_ticker((0..7).map(|_| ExchangeError::Timeout(Duration::from_secs(10))));
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();

        f.manager.start_strategy(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Running);
        assert!(has_log(&f.manager, id, LogLevel::Warning, "after 3 attempts").await);
        assert!(f.exchange.ticker_calls() > 7);
        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_trades_match_confirmed_orders() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();
        f.manager.start_strategy(id).await.unwrap();

        for price in [dec!(25000), dec!(21000), dec!(23000), dec!(28000), dec!(26000)] {
            f.exchange.paper.set_price("BTC/USDT", price);
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        f.manager.stop_strategy(id).await.unwrap();

        let trades = f.manager.trades(Some(id), 1000).await.unwrap();
        let placed = f.exchange.placed_order_ids();
        assert!(!trades.is_empty());
        for trade in &trades {
            assert!(placed.contains(&trade.order_id), "unconfirmed trade {}", trade.order_id);
        }
        assert!(trades.iter().any(|t| t.pnl.is_some()));
    }

    #[tokio::test]
    async fn test_insufficient_balance_marks_error() {
        let exchange = FaultyExchange::new(
            trading_exchange::PaperExchange::new().with_price("BTC/USDT", dec!(25000)),
        );
        let f = fixture(exchange, config());
        let id = f.manager.create_strategy("dca-1", "dca", dca_config()).await.unwrap();

        assert!(f.manager.start_strategy(id).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Error);
        assert!(has_log(&f.manager, id, LogLevel::Error, "Insufficient balance").await);
        assert!(f.manager.trades(Some(id), 10).await.unwrap().is_empty());
        assert!(f.manager.worker_info(id).is_none());

        // Stopping a failed strategy keeps its error status.
        assert!(f.manager.stop_strategy(id).await.unwrap());
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Error);
    }

    #[tokio::test]
    async fn test_failed_initialization_returns_false() {
        let f = fixture(FaultyExchange::with_price(dec!(100)), config());
        let record = f
            .store
            .create_strategy(NewStrategy {
                name: "broken".into(),
                kind: StrategyKind::Grid,
                config: serde_json::json!({"lower": 5, "upper": 1, "levels": 3}),
            })
            .await
            .unwrap();

        assert!(!f.manager.start_strategy(record).await.unwrap());
        assert_eq!(f.manager.get_strategy_status(record).await.unwrap(), StrategyStatus::Error);
        assert!(has_log(&f.manager, record, LogLevel::Error, "Failed to start").await);
    }

    #[tokio::test]
    async fn test_running_not_persisted_spawns_nothing() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();

        f.store.set_status_writes_failing(true);
        let err = f.manager.start_strategy(id).await.unwrap_err();
        assert!(matches!(err, TradingError::Persistence(_)));
        assert_eq!(f.manager.active_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_all_strategies() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let mut ids = Vec::new();
        for i in 0..3 {
            let id = f
                .manager
                .create_strategy(&format!("grid-{}", i), "grid", grid_config())
                .await
                .unwrap();
            f.manager.start_strategy(id).await.unwrap();
            ids.push(id);
        }

        let report = f.manager.stop_all_strategies().await;
        assert_eq!(report.stopped, ids);
        assert!(report.abandoned.is_empty());
        for id in ids {
            assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Stopped);
        }
    }

    #[tokio::test]
    async fn test_stop_all_abandons_stuck_workers() {
        let config = EngineConfig {
            shutdown_deadline: Duration::from_millis(50),
            ..config()
        };
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config);
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();
        f.exchange.set_ticker_delay(Duration::from_millis(500));
        f.manager.start_strategy(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = f.manager.stop_all_strategies().await;
        assert_eq!(report.abandoned, vec![id]);
        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Stopped);
    }

    #[tokio::test]
    async fn test_restore_resets_stale_running() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let stale = f.manager.create_strategy("a", "grid", grid_config()).await.unwrap();
        let idle = f.manager.create_strategy("b", "dca", dca_config()).await.unwrap();
        f.store.save_strategy_status(stale, StrategyStatus::Running).await.unwrap();

        let fresh = StrategyManager::new(f.exchange.clone(), f.store.clone(), config());
        assert_eq!(fresh.restore().await.unwrap(), 2);

        assert_eq!(
            fresh.statuses(),
            vec![(stale, StrategyStatus::Stopped), (idle, StrategyStatus::Stopped)]
        );
        let record = f.store.get_strategy(stale).await.unwrap().unwrap();
        assert_eq!(record.status, StrategyStatus::Stopped);
        assert!(has_log(&fresh, stale, LogLevel::Warning, "reset to stopped").await);
    }

    #[tokio::test]
    async fn test_restore_survives_status_write_failure() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let first = f.manager.create_strategy("a", "grid", grid_config()).await.unwrap();
        let second = f.manager.create_strategy("b", "dca", dca_config()).await.unwrap();
        f.store.save_strategy_status(first, StrategyStatus::Running).await.unwrap();
        f.store.save_strategy_status(second, StrategyStatus::Running).await.unwrap();
        f.store.set_status_writes_failing(true);

        let fresh = StrategyManager::new(f.exchange.clone(), f.store.clone(), config());
        assert_eq!(fresh.restore().await.unwrap(), 2);
        assert_eq!(
            fresh.statuses(),
            vec![(first, StrategyStatus::Stopped), (second, StrategyStatus::Stopped)]
        );
        assert!(has_log(&fresh, second, LogLevel::Warning, "reset to stopped").await);
    }

    #[tokio::test]
    async fn test_worker_panic_marks_error() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        let id = f.manager.create_strategy("grid-1", "grid", grid_config()).await.unwrap();
        f.exchange.panic_on_ticker();

        assert!(f.manager.start_strategy(id).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(f.manager.get_strategy_status(id).await.unwrap(), StrategyStatus::Error);
        assert!(has_log(&f.manager, id, LogLevel::Error, "worker panicked: ticker feed corrupted").await);
        assert!(f.manager.worker_info(id).is_none());
        assert_eq!(f.manager.active_count(), 0);

        // A failed strategy can be started again.
        assert!(f.manager.start_strategy(id).await.unwrap());
        f.manager.stop_strategy(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_lookups_of_unknown_ids_do_not_accumulate_locks() {
        let f = fixture(FaultyExchange::with_price(dec!(100)), config());

        for n in 0..50 {
            assert!(matches!(
                f.manager.start_strategy(StrategyId(1000 + n)).await,
                Err(TradingError::NotFound(_))
            ));
        }
        let held = f.manager.inner.locks.lock().unwrap().len();
        assert!(held <= 1, "{} locks retained", held);
    }

    #[tokio::test]
    async fn test_trade_write_failure_is_retried() {
        let f = fixture(FaultyExchange::with_price(dec!(25000)), config());
        f.store.fail_next_trade_writes(1);
        let id = f.manager.create_strategy("dca-1", "dca", dca_config()).await.unwrap();

        f.manager.start_strategy(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        f.manager.stop_strategy(id).await.unwrap();

        let trades = f.manager.trades(Some(id), 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].order_id, f.exchange.placed_order_ids()[0]);
    }
}

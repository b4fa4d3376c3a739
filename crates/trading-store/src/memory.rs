//! In-memory persistence store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use trading_core::error::StoreError;
use trading_core::traits::PersistenceStore;
use trading_core::types::{
    LogEntry, NewStrategy, StrategyDefinition, StrategyId, StrategyRecord, StrategyStatus, Trade,
};

#[derive(Default)]
struct Tables {
    next_id: u64,
    strategies: BTreeMap<StrategyId, StrategyRecord>,
    trades: Vec<Trade>,
    logs: Vec<LogEntry>,
}

/// Store that keeps every table in process memory.
///
/// Ids are assigned sequentially starting at 1. Trades and logs are kept in
/// append order; queries return them newest first.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored trades.
    pub fn trade_count(&self) -> usize {
        self.tables().trades.len()
    }

    /// Number of stored log entries.
    pub fn log_count(&self) -> usize {
        self.tables().logs.len()
    }
}

fn newest_first<T: Clone>(
    rows: &[T],
    strategy_id: Option<StrategyId>,
    owner: impl Fn(&T) -> Option<StrategyId>,
    limit: usize,
) -> Vec<T> {
    rows.iter()
        .rev()
        .filter(|row| strategy_id.is_none() || owner(row) == strategy_id)
        .take(limit)
        .cloned()
        .collect()
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn load_strategies(&self) -> Result<Vec<StrategyRecord>, StoreError> {
        Ok(self.tables().strategies.values().cloned().collect())
    }

    async fn get_strategy(&self, id: StrategyId) -> Result<Option<StrategyRecord>, StoreError> {
        Ok(self.tables().strategies.get(&id).cloned())
    }

    async fn create_strategy(&self, strategy: NewStrategy) -> Result<StrategyId, StoreError> {
        let mut tables = self.tables();
        tables.next_id += 1;
        let id = StrategyId(tables.next_id);

        let record = StrategyRecord {
            definition: StrategyDefinition {
                id,
                name: strategy.name,
                kind: strategy.kind,
                config: strategy.config,
                created_at: Utc::now(),
            },
            status: StrategyStatus::Stopped,
        };
        tables.strategies.insert(id, record);
        debug!(strategy_id = %id, "strategy persisted");
        Ok(id)
    }

    async fn save_strategy_status(
        &self,
        id: StrategyId,
        status: StrategyStatus,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let record = tables
            .strategies
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        record.status = status;
        Ok(())
    }

    async fn append_trade(&self, trade: Trade) -> Result<(), StoreError> {
        self.tables().trades.push(trade);
        Ok(())
    }

    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError> {
        self.tables().logs.push(entry);
        Ok(())
    }

    async fn get_trades(
        &self,
        strategy_id: Option<StrategyId>,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError> {
        let tables = self.tables();
        Ok(newest_first(&tables.trades, strategy_id, |t| Some(t.strategy_id), limit))
    }

    async fn get_logs(
        &self,
        strategy_id: Option<StrategyId>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, StoreError> {
        let tables = self.tables();
        Ok(newest_first(&tables.logs, strategy_id, |l| l.strategy_id, limit))
    }
}

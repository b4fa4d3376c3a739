//! Persistence store trait definition.

use crate::error::StoreError;
use crate::types::{LogEntry, NewStrategy, StrategyId, StrategyRecord, StrategyStatus, Trade};
use async_trait::async_trait;

/// Narrow read/write contract over the strategy, trade and log tables.
///
/// Shared by every worker and the manager, so implementations must be safe
/// for concurrent use.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Load every strategy definition with its persisted status.
    async fn load_strategies(&self) -> Result<Vec<StrategyRecord>, StoreError>;

    /// Load a single strategy.
    async fn get_strategy(&self, id: StrategyId) -> Result<Option<StrategyRecord>, StoreError>;

    /// Persist a new definition with status `stopped` and return its id.
    async fn create_strategy(&self, strategy: NewStrategy) -> Result<StrategyId, StoreError>;

    /// Overwrite the persisted status of a strategy.
    async fn save_strategy_status(
        &self,
        id: StrategyId,
        status: StrategyStatus,
    ) -> Result<(), StoreError>;

    /// Append a trade record.
    async fn append_trade(&self, trade: Trade) -> Result<(), StoreError>;

    /// Append a log entry.
    async fn append_log(&self, entry: LogEntry) -> Result<(), StoreError>;

    /// Most recent trades first, optionally for one strategy.
    async fn get_trades(
        &self,
        strategy_id: Option<StrategyId>,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError>;

    /// Most recent log entries first, optionally for one strategy.
    async fn get_logs(
        &self,
        strategy_id: Option<StrategyId>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, StoreError>;
}

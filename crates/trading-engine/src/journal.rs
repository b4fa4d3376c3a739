//! Per-worker writer for trades and log entries.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{error, warn};
use trading_core::traits::PersistenceStore;
use trading_core::types::{LogEntry, LogLevel, StrategyId, Trade};

struct PendingTrade {
    trade: Trade,
    failed_once: bool,
}

/// Writes a strategy's trades and log entries to the store.
///
/// Log writes are best-effort. A trade that fails to write is queued and
/// every later trade waits behind it, so trades reach the store in the
/// order they executed. A queued trade gets one retry; if that fails too it
/// is dropped and reported.
pub struct Journal {
    strategy_id: Option<StrategyId>,
    store: Arc<dyn PersistenceStore>,
    pending: VecDeque<PendingTrade>,
}

impl Journal {
    pub fn new(strategy_id: Option<StrategyId>, store: Arc<dyn PersistenceStore>) -> Self {
        Self {
            strategy_id,
            store,
            pending: VecDeque::new(),
        }
    }

    /// Append a log entry, ignoring store failures.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(self.strategy_id, level, message);
        if let Err(e) = self.store.append_log(entry).await {
            warn!(strategy_id = ?self.strategy_id, error = %e, "Failed to persist log entry");
        }
    }

    /// Record a confirmed trade, queueing it if it cannot be written now.
    pub async fn record_trade(&mut self, trade: Trade) {
        if !self.pending.is_empty() {
            self.pending.push_back(PendingTrade {
                trade,
                failed_once: false,
            });
            return;
        }

        if let Err(e) = self.store.append_trade(trade.clone()).await {
            warn!(
                strategy_id = %trade.strategy_id,
                order_id = %trade.order_id,
                error = %e,
                "Trade write failed, queued for retry"
            );
            self.pending.push_back(PendingTrade {
                trade,
                failed_once: true,
            });
        }
    }

    /// Write queued trades in order.
    ///
    /// Stops at the first trade that fails for the first time so it keeps
    /// its place; a trade failing its retry is dropped.
    pub async fn flush(&mut self) {
        while let Some(mut pending) = self.pending.pop_front() {
            let Err(e) = self.store.append_trade(pending.trade.clone()).await else {
                continue;
            };

            if !pending.failed_once {
                warn!(order_id = %pending.trade.order_id, error = %e, "Trade write failed, queued for retry");
                pending.failed_once = true;
                self.pending.push_front(pending);
                break;
            }

            let trade = pending.trade;
            error!(
                strategy_id = %trade.strategy_id,
                order_id = %trade.order_id,
                error = %e,
                "Dropping trade after failed retry"
            );
            self.log(
                LogLevel::Error,
                format!(
                    "Trade {} {} {} @ {} (order {}) could not be recorded: {}",
                    trade.side, trade.quantity, trade.symbol, trade.price, trade.order_id, e
                ),
            )
            .await;
        }
    }

    /// Flush until the queue is empty, giving every trade its retry.
    pub async fn drain(&mut self) {
        while !self.pending.is_empty() {
            self.flush().await;
        }
    }

    /// Number of trades waiting to be written.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

//! Manager-side view of a live worker.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use trading_core::types::{StrategyId, StrategyStatus};

use crate::worker::WorkerOutcome;

/// Phase of a worker's execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Initializing,
    Evaluating,
    Acting,
    Waiting,
    Terminated,
}

#[derive(Debug)]
struct ProbeState {
    heartbeat: DateTime<Utc>,
    state: WorkerState,
    status: StrategyStatus,
}

/// State the worker publishes for the manager to read.
#[derive(Debug)]
pub struct WorkerProbe {
    inner: Mutex<ProbeState>,
}

impl WorkerProbe {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ProbeState {
                heartbeat: Utc::now(),
                state: WorkerState::Initializing,
                status: StrategyStatus::Running,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record liveness and enter `state`.
    pub fn beat(&self, state: WorkerState) {
        let mut probe = self.lock();
        probe.heartbeat = Utc::now();
        probe.state = state;
    }

    pub fn set_state(&self, state: WorkerState) {
        self.lock().state = state;
    }

    pub fn set_status(&self, status: StrategyStatus) {
        self.lock().status = status;
    }

    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    pub fn status(&self) -> StrategyStatus {
        self.lock().status
    }

    pub fn heartbeat(&self) -> DateTime<Utc> {
        self.lock().heartbeat
    }
}

impl Default for WorkerProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of a live worker.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub strategy_id: StrategyId,
    pub generation: u64,
    pub state: WorkerState,
    pub status: StrategyStatus,
    pub last_heartbeat: DateTime<Utc>,
}

/// Everything the manager keeps about one running worker.
pub(crate) struct WorkerHandle {
    pub strategy_id: StrategyId,
    pub generation: u64,
    pub cancel: watch::Sender<bool>,
    pub probe: Arc<WorkerProbe>,
    pub outcome: oneshot::Receiver<WorkerOutcome>,
    pub task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            strategy_id: self.strategy_id,
            generation: self.generation,
            state: self.probe.state(),
            status: self.probe.status(),
            last_heartbeat: self.probe.heartbeat(),
        }
    }

    /// Raise the cancellation flag. Returns false if the worker is gone.
    pub fn cancel(&self) -> bool {
        self.cancel.send(true).is_ok()
    }
}

//! Strategy definition and status types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StrategyError;

/// Unique strategy identifier, assigned by the store at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(pub u64);

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StrategyId {
    fn from(id: u64) -> Self {
        StrategyId(id)
    }
}

/// Supported strategy algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Buy and sell at evenly spaced price levels
    Grid,
    /// Dollar-cost averaging: buy a fixed quote amount on a schedule
    Dca,
    /// Follow the rate of change over a lookback window
    Momentum,
}

impl StrategyKind {
    /// All supported kinds.
    pub const ALL: [StrategyKind; 3] = [StrategyKind::Grid, StrategyKind::Dca, StrategyKind::Momentum];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Grid => "grid",
            StrategyKind::Dca => "dca",
            StrategyKind::Momentum => "momentum",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(StrategyKind::Grid),
            "dca" => Ok(StrategyKind::Dca),
            "momentum" => Ok(StrategyKind::Momentum),
            other => Err(StrategyError::UnknownKind(other.to_string())),
        }
    }
}

/// Authoritative lifecycle status of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Stopped,
    Running,
    Error,
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyStatus::Stopped => write!(f, "stopped"),
            StrategyStatus::Running => write!(f, "running"),
            StrategyStatus::Error => write!(f, "error"),
        }
    }
}

/// A strategy as submitted for creation, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStrategy {
    pub name: String,
    pub kind: StrategyKind,
    /// Parameter set as submitted; validated by the kind before it gets here
    pub config: serde_json::Value,
}

/// Persisted definition of a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub id: StrategyId,
    pub name: String,
    pub kind: StrategyKind,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A definition together with its last persisted status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub definition: StrategyDefinition,
    pub status: StrategyStatus,
}

impl StrategyRecord {
    pub fn id(&self) -> StrategyId {
        self.definition.id
    }
}

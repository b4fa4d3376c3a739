//! Strategy registry: the catalogue of supported strategy kinds.

use crate::{DcaConfig, GridConfig, MomentumConfig, StrategyParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trading_core::{error::StrategyError, traits::TradingAlgorithm, types::StrategyKind};

/// Information about a registered strategy kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy kind
    pub kind: StrategyKind,
    /// Display name
    pub name: String,
    /// Strategy description
    pub description: String,
    /// Example configuration as JSON
    pub example_config: serde_json::Value,
}

/// Registry for available trading strategies.
pub struct StrategyRegistry {
    strategies: HashMap<StrategyKind, StrategyInfo>,
}

impl StrategyRegistry {
    /// Create a new strategy registry with all built-in strategies.
    pub fn new() -> Self {
        let mut strategies = HashMap::new();

        strategies.insert(
            StrategyKind::Grid,
            StrategyInfo {
                kind: StrategyKind::Grid,
                name: "Grid".to_string(),
                description: "Buys and sells at evenly spaced levels between a lower and upper bound"
                    .to_string(),
                example_config: serde_json::to_value(GridConfig::default())
                    .unwrap_or(serde_json::Value::Null),
            },
        );

        strategies.insert(
            StrategyKind::Dca,
            StrategyInfo {
                kind: StrategyKind::Dca,
                name: "DCA".to_string(),
                description: "Buys a fixed quote amount on a schedule with optional take-profit"
                    .to_string(),
                example_config: serde_json::to_value(DcaConfig::default())
                    .unwrap_or(serde_json::Value::Null),
            },
        );

        strategies.insert(
            StrategyKind::Momentum,
            StrategyInfo {
                kind: StrategyKind::Momentum,
                name: "Momentum".to_string(),
                description: "Follows strong trends using the rate of change over a lookback window"
                    .to_string(),
                example_config: serde_json::to_value(MomentumConfig::default())
                    .unwrap_or(serde_json::Value::Null),
            },
        );

        Self { strategies }
    }

    /// List all available strategies, in declaration order of the kinds.
    pub fn list(&self) -> Vec<&StrategyInfo> {
        StrategyKind::ALL
            .iter()
            .filter_map(|kind| self.strategies.get(kind))
            .collect()
    }

    /// Get strategy info by kind name.
    pub fn get(&self, name: &str) -> Option<&StrategyInfo> {
        let kind = name.parse::<StrategyKind>().ok()?;
        self.strategies.get(&kind)
    }

    /// Check if a strategy exists.
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Validate a raw definition without building anything.
    pub fn validate(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<StrategyParams, StrategyError> {
        let kind = name.parse::<StrategyKind>()?;
        StrategyParams::resolve(kind, config)
    }

    /// Create a strategy instance from configuration.
    pub fn create(
        &self,
        name: &str,
        config: &serde_json::Value,
    ) -> Result<Box<dyn TradingAlgorithm>, StrategyError> {
        let mut algorithm = self.validate(name, config)?.into_algorithm();
        algorithm.initialize()?;
        Ok(algorithm)
    }

    /// Create a strategy with its example configuration.
    pub fn create_default(&self, name: &str) -> Result<Box<dyn TradingAlgorithm>, StrategyError> {
        let info = self
            .get(name)
            .ok_or_else(|| StrategyError::UnknownKind(name.to_string()))?;
        self.create(name, &info.example_config)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_list() {
        let registry = StrategyRegistry::new();
        let kinds: Vec<StrategyKind> = registry.list().iter().map(|info| info.kind).collect();

        assert_eq!(kinds, StrategyKind::ALL.to_vec());
    }

    #[test]
    fn test_registry_get() {
        let registry = StrategyRegistry::new();

        assert!(registry.get("grid").is_some());
        assert!(registry.exists("DCA"));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_create_default() {
        let registry = StrategyRegistry::new();

        for info in registry.list() {
            let strategy = registry.create_default(info.kind.as_str());
            assert!(strategy.is_ok(), "{} example config must be valid", info.kind);
        }

        let strategy = registry.create_default("grid").unwrap();
        assert_eq!(strategy.name(), "Grid");
        assert_eq!(strategy.symbol(), "BTC/USDT");
    }

    #[test]
    fn test_create_with_config() {
        let registry = StrategyRegistry::new();

        let config = serde_json::json!({
            "symbol": "ETH/USDT",
            "lookback": 5,
            "threshold_pct": 0.5
        });

        let strategy = registry.create("momentum", &config);
        assert!(strategy.is_ok());
    }

    #[test]
    fn test_create_unknown_strategy() {
        let registry = StrategyRegistry::new();

        let result = registry.create_default("unknown");
        assert!(matches!(result, Err(StrategyError::UnknownKind(_))));
    }
}

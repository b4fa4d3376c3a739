//! Resolution of raw strategy parameter maps into typed configs.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{StrategyConfig, TradingAlgorithm},
    types::StrategyKind,
};

use crate::{DcaConfig, DcaStrategy, GridConfig, GridStrategy, MomentumConfig, MomentumStrategy};

/// Symbol traded when a config does not name one.
pub const DEFAULT_SYMBOL: &str = "BTC/USDT";

/// Upper bound on any price, amount or percentage in a config.
pub const MAX_MAGNITUDE: Decimal = dec!(1000000000000);

pub(crate) fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

/// Smallest order the exchange accepts for the default symbol.
pub(crate) fn default_order_size() -> Decimal {
    dec!(0.001)
}

pub(crate) fn validate_magnitude(field: &str, value: Decimal) -> Result<(), StrategyError> {
    if value > MAX_MAGNITUDE {
        return Err(StrategyError::InvalidConfig(format!(
            "{} must not exceed {}",
            field, MAX_MAGNITUDE
        )));
    }
    Ok(())
}

pub(crate) fn validate_symbol(symbol: &str) -> Result<(), StrategyError> {
    match symbol.split_once('/') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() => Ok(()),
        _ => Err(StrategyError::InvalidConfig(format!(
            "Symbol must look like BASE/QUOTE, got '{}'",
            symbol
        ))),
    }
}

/// Validated parameters of one strategy, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StrategyParams {
    Grid(GridConfig),
    Dca(DcaConfig),
    Momentum(MomentumConfig),
}

impl StrategyParams {
    /// Parse and validate a raw parameter map for the given kind.
    pub fn resolve(kind: StrategyKind, config: &serde_json::Value) -> Result<Self, StrategyError> {
        let params = match kind {
            StrategyKind::Grid => StrategyParams::Grid(parse(config)?),
            StrategyKind::Dca => StrategyParams::Dca(parse(config)?),
            StrategyKind::Momentum => StrategyParams::Momentum(parse(config)?),
        };
        params.validate()?;
        Ok(params)
    }

    /// Get the strategy kind.
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyParams::Grid(_) => StrategyKind::Grid,
            StrategyParams::Dca(_) => StrategyKind::Dca,
            StrategyParams::Momentum(_) => StrategyKind::Momentum,
        }
    }

    /// Get the traded symbol.
    pub fn symbol(&self) -> &str {
        match self {
            StrategyParams::Grid(c) => c.symbol(),
            StrategyParams::Dca(c) => c.symbol(),
            StrategyParams::Momentum(c) => c.symbol(),
        }
    }

    /// Validate the wrapped configuration.
    pub fn validate(&self) -> Result<(), StrategyError> {
        match self {
            StrategyParams::Grid(c) => c.validate(),
            StrategyParams::Dca(c) => c.validate(),
            StrategyParams::Momentum(c) => c.validate(),
        }
    }

    /// Build the algorithm that executes these parameters.
    pub fn into_algorithm(self) -> Box<dyn TradingAlgorithm> {
        match self {
            StrategyParams::Grid(c) => Box::new(GridStrategy::new(c)),
            StrategyParams::Dca(c) => Box::new(DcaStrategy::new(c)),
            StrategyParams::Momentum(c) => Box::new(MomentumStrategy::new(c)),
        }
    }
}

fn parse<T: DeserializeOwned>(config: &serde_json::Value) -> Result<T, StrategyError> {
    let config = match config {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        serde_json::Value::Object(_) => config.clone(),
        other => {
            return Err(StrategyError::InvalidConfig(format!(
                "Parameters must be an object, got {}",
                other
            )))
        }
    };
    serde_json::from_value(config).map_err(|e| StrategyError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_grid_with_defaults() {
        let params = StrategyParams::resolve(
            StrategyKind::Grid,
            &json!({"lower": 20000, "upper": 30000, "levels": 5}),
        )
        .unwrap();

        assert_eq!(params.kind(), StrategyKind::Grid);
        assert_eq!(params.symbol(), DEFAULT_SYMBOL);
        match params {
            StrategyParams::Grid(c) => {
                assert_eq!(c.lower, dec!(20000));
                assert_eq!(c.order_size, dec!(0.001));
            }
            other => panic!("unexpected params: {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = StrategyParams::resolve(StrategyKind::Grid, &json!({"lower": 1, "levels": 3}))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidConfig(msg) if msg.contains("upper")));
    }

    #[test]
    fn test_out_of_range_parameter() {
        let err = StrategyParams::resolve(
            StrategyKind::Grid,
            &json!({"lower": 30000, "upper": 20000, "levels": 5}),
        )
        .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(StrategyParams::resolve(StrategyKind::Momentum, &json!([1, 2])).is_err());
        assert!(StrategyParams::resolve(StrategyKind::Momentum, &serde_json::Value::Null).is_ok());
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let err = StrategyParams::resolve(
            StrategyKind::Dca,
            &json!({"quote_amount": "79228162514264337593543950335"}),
        )
        .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidConfig(msg) if msg.contains("must not exceed")));

        assert!(StrategyParams::resolve(
            StrategyKind::Grid,
            &json!({"lower": 1, "upper": "2000000000000", "levels": 3}),
        )
        .is_err());
        assert!(StrategyParams::resolve(StrategyKind::Momentum, &json!({"order_size": "10000000000000"})).is_err());
    }

    #[test]
    fn test_bad_symbol() {
        let err = StrategyParams::resolve(StrategyKind::Momentum, &json!({"symbol": "BTCUSDT"}))
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidConfig(msg) if msg.contains("BASE/QUOTE")));
    }

    #[test]
    fn test_into_algorithm_uses_symbol() {
        let params = StrategyParams::resolve(
            StrategyKind::Dca,
            &json!({"symbol": "ETH/USDT", "quote_amount": "25"}),
        )
        .unwrap();
        let algo = params.into_algorithm();
        assert_eq!(algo.symbol(), "ETH/USDT");
        assert_eq!(algo.name(), "DCA");
    }
}

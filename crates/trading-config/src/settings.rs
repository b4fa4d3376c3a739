//! Configuration structures.

use config::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trading_engine::{EngineConfig, RetryPolicy};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub paper: PaperSettings,
}

impl AppConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("engine.stop_grace_ms", self.engine.stop_grace_ms),
            ("engine.shutdown_deadline_ms", self.engine.shutdown_deadline_ms),
            ("engine.request_timeout_ms", self.engine.request_timeout_ms),
            ("engine.poll_interval_ms", self.engine.poll_interval_ms),
            ("retry.max_delay_ms", self.retry.max_delay_ms),
            ("paper.tick_ms", self.paper.tick_ms),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Message(format!("{} must be greater than 0", key)));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Message(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::Message(
                "retry.jitter_factor must be between 0 and 1".into(),
            ));
        }
        if self.paper.spread_pct < Decimal::ZERO {
            return Err(ConfigError::Message(
                "paper.spread_pct must not be negative".into(),
            ));
        }
        if let Some(market) = self.paper.markets.iter().find(|m| m.price <= Decimal::ZERO) {
            return Err(ConfigError::Message(format!(
                "paper.markets: price for {} must be greater than 0",
                market.symbol
            )));
        }
        Ok(())
    }

    /// Engine parameters derived from the `engine` and `retry` sections.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            stop_grace: Duration::from_millis(self.engine.stop_grace_ms),
            shutdown_deadline: Duration::from_millis(self.engine.shutdown_deadline_ms),
            request_timeout: Duration::from_millis(self.engine.request_timeout_ms),
            default_poll_interval: Duration::from_millis(self.engine.poll_interval_ms),
            cancel_open_orders_on_stop: self.engine.cancel_open_orders_on_stop,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                jitter_factor: self.retry.jitter_factor,
            },
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// General app settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "strategy-engine".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
    /// Directory for daily rolling log files
    pub file: Option<String>,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

/// Strategy manager and worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub stop_grace_ms: u64,
    pub shutdown_deadline_ms: u64,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub cancel_open_orders_on_stop: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            stop_grace_ms: engine.stop_grace.as_millis() as u64,
            shutdown_deadline_ms: engine.shutdown_deadline.as_millis() as u64,
            request_timeout_ms: engine.request_timeout.as_millis() as u64,
            poll_interval_ms: engine.default_poll_interval.as_millis() as u64,
            cancel_open_orders_on_stop: engine.cancel_open_orders_on_stop,
        }
    }
}

/// Retry policy for transient exchange errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Random spread of each delay, as a fraction of it
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_attempts: retry.max_attempts,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            jitter_factor: retry.jitter_factor,
        }
    }
}

/// Starting balance of one asset on the paper exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalanceSetting {
    pub asset: String,
    pub amount: Decimal,
}

/// Starting price of one market on the paper exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSetting {
    pub symbol: String,
    pub price: Decimal,
}

/// Simulation mode settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperSettings {
    /// Bid/ask spread in percent of the last price
    pub spread_pct: Decimal,
    /// Amplitude of the simulated price swing, in percent
    pub swing_pct: Decimal,
    /// Interval between simulated price updates
    pub tick_ms: u64,
    pub balances: Vec<AssetBalanceSetting>,
    pub markets: Vec<MarketSetting>,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            spread_pct: dec!(0.02),
            swing_pct: dec!(3),
            tick_ms: 1000,
            balances: vec![
                AssetBalanceSetting {
                    asset: "USDT".to_string(),
                    amount: dec!(10000),
                },
                AssetBalanceSetting {
                    asset: "BTC".to_string(),
                    amount: dec!(0.1),
                },
            ],
            markets: vec![MarketSetting {
                symbol: "BTC/USDT".to_string(),
                price: dec!(25000),
            }],
        }
    }
}

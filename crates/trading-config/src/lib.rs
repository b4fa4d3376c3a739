//! Configuration management.

mod settings;

pub use settings::{
    AppConfig, AppSettings, AssetBalanceSetting, EngineSettings, LoggingConfig, MarketSetting,
    PaperSettings, RetrySettings,
};

pub use config::ConfigError;

use config::{Config, Environment, File};
use std::path::Path;

/// Load configuration from file and environment.
///
/// Environment variables named `ENGINE__<SECTION>__<KEY>` override the file,
/// e.g. `ENGINE__RETRY__MAX_ATTEMPTS=5`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(
            Environment::with_prefix("ENGINE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

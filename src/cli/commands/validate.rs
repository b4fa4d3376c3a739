//! Validate configuration command.

use anyhow::Result;
use std::path::Path;
use trading_config::{AppConfig, ConfigError};

pub async fn run(config_path: &Path, config: Result<AppConfig, ConfigError>) -> Result<()> {
    println!("Validating configuration: {:?}", config_path);

    match config {
        Ok(config) => {
            let engine = config.engine_config();
            println!("Configuration is valid!");
            println!();
            println!("App: {}", config.app.name);
            println!("Environment: {}", config.app.environment);
            println!("Log level: {}", config.logging.level);
            println!("Stop grace: {:?}", engine.stop_grace);
            println!("Request timeout: {:?}", engine.request_timeout);
            println!("Poll interval: {:?}", engine.default_poll_interval);
            println!(
                "Retry: {} attempts, {:?} to {:?}",
                engine.retry.max_attempts, engine.retry.base_delay, engine.retry.max_delay
            );
            println!("Paper markets: {}", config.paper.markets.len());
            println!();
            println!("Effective configuration:");
            println!("{}", config.to_toml()?);
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

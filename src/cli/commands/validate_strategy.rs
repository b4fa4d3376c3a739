//! Validate strategy definition command.

use anyhow::{Context, Result};
use trading_strategies::StrategyRegistry;

use crate::cli::ValidateStrategyArgs;

pub async fn run(args: ValidateStrategyArgs) -> Result<()> {
    let params: serde_json::Value =
        serde_json::from_str(&args.params).context("Parameters must be valid JSON")?;

    let registry = StrategyRegistry::new();
    match registry.validate(&args.kind, &params) {
        Ok(resolved) => {
            println!("Strategy definition is valid!");
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(())
        }
        Err(e) => {
            println!("Invalid strategy definition: {}", e);
            Err(e.into())
        }
    }
}

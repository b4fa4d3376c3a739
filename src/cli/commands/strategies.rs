//! List strategies command.

use anyhow::Result;
use trading_strategies::StrategyRegistry;

pub async fn run() -> Result<()> {
    let registry = StrategyRegistry::new();

    println!("Available Strategies");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {} ({})", info.name, info.kind);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        println!("  Example: {}", info.example_config);
        println!();
    }

    let kinds: Vec<&str> = registry.list().iter().map(|info| info.kind.as_str()).collect();
    println!("Strategy types: {}", kinds.join(", "));

    Ok(())
}

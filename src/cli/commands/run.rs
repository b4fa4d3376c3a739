//! Run strategies in simulation mode.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use trading_config::{AppConfig, PaperSettings};
use trading_core::traits::ExchangeGateway;
use trading_core::types::StrategyId;
use trading_engine::StrategyManager;
use trading_exchange::{split_symbol, PaperExchange};
use trading_monitor::DashboardSummary;
use trading_store::MemoryStore;

use crate::cli::RunArgs;

/// One entry of the strategies file.
#[derive(Debug, Deserialize)]
struct StrategyEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default = "default_start")]
    start: bool,
}

fn default_start() -> bool {
    true
}

fn load_strategies(path: &Path) -> Result<Vec<StrategyEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read strategies file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse strategies file {}", path.display()))
}

fn paper_exchange(settings: &PaperSettings) -> PaperExchange {
    let mut exchange = PaperExchange::new().with_spread(settings.spread_pct);
    for balance in &settings.balances {
        exchange = exchange.with_balance(balance.asset.clone(), balance.amount);
    }
    for market in &settings.markets {
        exchange = exchange.with_price(market.symbol.clone(), market.price);
    }
    exchange
}

/// Swing every market around its configured price until shutdown.
async fn price_feed(exchange: PaperExchange, settings: PaperSettings, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_millis(settings.tick_ms));
    let swing = settings.swing_pct / Decimal::ONE_HUNDRED;
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        tick += 1;

        for (i, market) in settings.markets.iter().enumerate() {
            let phase = tick as f64 / 20.0 + i as f64;
            let wave = Decimal::try_from(phase.sin()).unwrap_or_default();
            let price = (market.price * (Decimal::ONE + swing * wave)).round_dp(2);
            exchange.set_price(market.symbol.clone(), price);
        }
    }
}

pub async fn run(args: RunArgs, config: AppConfig) -> Result<()> {
    let entries = load_strategies(&args.strategies)?;

    let paper = paper_exchange(&config.paper);
    let store = Arc::new(MemoryStore::new());
    let manager = StrategyManager::new(Arc::new(paper.clone()), store, config.engine_config());
    manager.restore().await?;

    info!(
        exchange = paper.name(),
        strategies = entries.len(),
        "Starting simulation"
    );

    let mut names: Vec<(StrategyId, String)> = Vec::new();
    for entry in entries {
        let id = manager
            .create_strategy(&entry.name, &entry.kind, entry.config)
            .await
            .with_context(|| format!("Invalid strategy '{}'", entry.name))?;

        if entry.start && !args.no_start && !manager.start_strategy(id).await? {
            warn!(strategy_id = %id, name = %entry.name, "Strategy did not start");
        }
        names.push((id, entry.name));
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed = tokio::spawn(price_feed(paper.clone(), config.paper.clone(), shutdown_rx));

    match args.duration {
        Some(secs) => tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for Ctrl-C")?,
        },
        None => tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?,
    }

    info!("Shutting down");
    let report = manager.stop_all_strategies().await;
    let _ = shutdown_tx.send(true);
    let _ = feed.await;

    let trades = manager.trades(None, 1000).await?;
    let quote = config
        .paper
        .markets
        .first()
        .and_then(|m| split_symbol(&m.symbol).ok())
        .map(|(_, quote)| quote.to_string())
        .unwrap_or_else(|| "USDT".to_string());
    let balance = paper.get_balance().await.ok().map(|b| b.free(&quote));
    let statuses = manager.statuses();
    let summary = DashboardSummary::collect(&statuses, &trades, balance, Utc::now().date_naive());

    println!();
    println!("Strategies");
    println!("═══════════════════════════════════════════════════════════");
    for (id, status) in &statuses {
        let name = names
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, name)| name.as_str())
            .unwrap_or("?");
        println!("  #{:<4} {:<24} {}", id, name, status);
    }
    if !report.abandoned.is_empty() {
        println!("  Detached at shutdown: {:?}", report.abandoned);
    }

    println!();
    println!("{}", summary);

    if !trades.is_empty() {
        println!();
        println!("Recent trades");
        println!("───────────────────────────────────────────────────────────");
        for trade in trades.iter().take(10) {
            let pnl = trade.pnl.map(|p| format!("{:.2}", p)).unwrap_or_default();
            println!(
                "  {} #{} {} {} {} @ {} {}",
                trade.timestamp.format("%H:%M:%S"),
                trade.strategy_id,
                trade.side,
                trade.quantity,
                trade.symbol,
                trade.price,
                pnl
            );
        }
    }

    Ok(())
}

//! Market data types returned by the exchange gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::OpenOrder;

/// Best bid/ask and last trade price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
}

impl Ticker {
    /// Mid price between bid and ask.
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Free and locked amounts of a single asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub free: Decimal,
    pub locked: Decimal,
}

impl AssetBalance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// Account balances keyed by asset code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(pub HashMap<String, AssetBalance>);

impl Balances {
    /// Free amount of an asset, zero when the asset is unknown.
    pub fn free(&self, asset: &str) -> Decimal {
        self.0.get(asset).map(|b| b.free).unwrap_or(Decimal::ZERO)
    }

    pub fn get(&self, asset: &str) -> Option<&AssetBalance> {
        self.0.get(asset)
    }
}

/// Everything a strategy sees when it evaluates one cycle.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub ticker: Ticker,
    pub balances: Balances,
    pub open_orders: Vec<OpenOrder>,
    pub at: DateTime<Utc>,
}

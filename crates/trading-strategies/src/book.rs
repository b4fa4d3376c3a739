//! Spot inventory tracking shared by all strategy kinds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::types::Side;

/// Long-only inventory with average entry price and realized P&L.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionBook {
    /// Base asset held
    pub quantity: Decimal,
    /// Average entry price of the held quantity
    pub avg_entry_price: Decimal,
    /// Realized profit/loss from closed portions
    pub realized_pnl: Decimal,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing is held.
    pub fn is_flat(&self) -> bool {
        self.quantity == Decimal::ZERO
    }

    /// Apply a fill to the book.
    ///
    /// Returns the realized P&L for sells, `None` for buys. Sells beyond
    /// the held quantity only realize P&L on the held part.
    pub fn apply_fill(&mut self, side: Side, quantity: Decimal, price: Decimal) -> Option<Decimal> {
        match side {
            Side::Buy => {
                let total_cost = self.quantity * self.avg_entry_price + quantity * price;
                self.quantity += quantity;
                if self.quantity != Decimal::ZERO {
                    self.avg_entry_price = total_cost / self.quantity;
                }
                None
            }
            Side::Sell => {
                let close_qty = quantity.min(self.quantity);
                let realized = close_qty * (price - self.avg_entry_price);
                self.realized_pnl += realized;
                self.quantity -= close_qty;
                if self.is_flat() {
                    self.avg_entry_price = Decimal::ZERO;
                }
                Some(realized)
            }
        }
    }
}

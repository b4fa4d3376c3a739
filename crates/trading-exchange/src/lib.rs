//! Exchange gateway implementations.

mod paper;

pub use paper::PaperExchange;

use trading_core::error::ExchangeError;

/// Split a `BASE/QUOTE` symbol into its assets.
pub fn split_symbol(symbol: &str) -> Result<(&str, &str), ExchangeError> {
    match symbol.split_once('/') {
        Some((base, quote)) if !base.is_empty() && !quote.is_empty() => Ok((base, quote)),
        _ => Err(ExchangeError::InvalidSymbol(symbol.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("BTC/USDT").unwrap(), ("BTC", "USDT"));
        assert!(split_symbol("BTCUSDT").is_err());
        assert!(split_symbol("/USDT").is_err());
    }
}

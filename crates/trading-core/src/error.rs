//! Error types for the strategy execution engine.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::StrategyId;

/// Errors surfaced to callers of lifecycle operations.
///
/// Errors raised inside a running worker never travel through this type;
/// they end up as a strategy status and log entries instead.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Strategy not found: {0}")]
    NotFound(StrategyId),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl From<StrategyError> for TradingError {
    fn from(err: StrategyError) -> Self {
        TradingError::Validation(err.to_string())
    }
}

/// Strategy definition errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown strategy type: {0}")]
    UnknownKind(String),

    #[error("Strategy initialization failed: {0}")]
    InitializationFailed(String),
}

/// How the engine reacts to an exchange failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Expected to resolve on its own; retried with backoff.
    Transient,
    /// Will not resolve by retrying; fatal to the current run.
    Structural,
}

/// Exchange gateway errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The server failed after the request reached it; a submitted order
    /// may or may not exist.
    #[error("Exchange server error: {0}")]
    ServerError(String),

    #[error("Insufficient balance: {asset} required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),
}

impl ExchangeError {
    /// Classify the error as transient or structural.
    pub fn class(&self) -> ErrorClass {
        match self {
            ExchangeError::Timeout(_)
            | ExchangeError::Network(_)
            | ExchangeError::RateLimited { .. }
            | ExchangeError::ServiceUnavailable(_)
            | ExchangeError::ServerError(_) => ErrorClass::Transient,
            ExchangeError::InsufficientBalance { .. }
            | ExchangeError::InvalidSymbol(_)
            | ExchangeError::Authentication(_)
            | ExchangeError::OrderRejected(_)
            | ExchangeError::OrderNotFound(_) => ErrorClass::Structural,
        }
    }

    /// Check if the error is transient.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Whether a failed order submission is known not to have reached the book.
    ///
    /// Timeouts, network failures and server errors leave the order state
    /// unknown, so resubmitting could place it twice.
    pub fn is_safe_to_resubmit(&self) -> bool {
        matches!(
            self,
            ExchangeError::RateLimited { .. } | ExchangeError::ServiceUnavailable(_)
        )
    }

    /// Map a raw HTTP response status onto the error taxonomy.
    ///
    /// `retry_after_secs` is the response's `Retry-After` header, if any.
    /// Only 503 counts as a refusal; other 5xx statuses may follow an
    /// accepted request.
    pub fn from_status(status: u16, retry_after_secs: Option<u64>, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            408 => ExchangeError::Timeout(Duration::ZERO),
            429 => ExchangeError::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or(1),
            },
            401 | 403 => ExchangeError::Authentication(body),
            404 => ExchangeError::InvalidSymbol(body),
            503 => ExchangeError::ServiceUnavailable(format!("{}: {}", status, body)),
            500..=599 => ExchangeError::ServerError(format!("{}: {}", status, body)),
            _ => ExchangeError::OrderRejected(format!("{}: {}", status, body)),
        }
    }
}

/// Persistence store errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(StrategyId),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for lifecycle operations.
pub type TradingResult<T> = Result<T, TradingError>;

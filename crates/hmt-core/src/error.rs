//! Error types for hmt-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

//! Broker error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Broker API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Failed to parse broker response: {0}")]
    Parse(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;

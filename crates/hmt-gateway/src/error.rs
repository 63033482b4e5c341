//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Core(#[from] hmt_core::CoreError),

    #[error("Store error: {0}")]
    Store(#[from] hmt_store::StoreError),

    #[error("Broker error: {0}")]
    Broker(#[from] hmt_broker::BrokerError),

    #[error("Server error: {0}")]
    Server(#[from] hmt_server::ServerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] hmt_telemetry::TelemetryError),
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

//! Gateway error types.
//!
//! [`GatewayError`] ends the whole request; [`AccountError`] ends one
//! account's branch and is reported in that account's result.

use hmt_broker::BrokerError;
use hmt_core::AuditStatus;
use hmt_store::StoreError;
use thiserror::Error;

/// Body text returned for faults whose detail stays in logs and audit.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or missing payload fields.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown or inactive webhook key.
    #[error("Unauthorized: {0}")]
    Auth(String),

    /// The key resolves but nothing is configured to trade.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status for the response.
    ///
    /// Business rejections stay 200; only malformed input, auth and
    /// internal faults leave the 2xx range.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Auth(_) => 401,
            Self::Config(_) | Self::InstrumentNotFound(_) => 200,
            Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    pub fn audit_status(&self) -> AuditStatus {
        match self {
            Self::Store(_) | Self::Internal(_) => AuditStatus::Error,
            _ => AuditStatus::Rejected,
        }
    }

    /// Text safe to return to the caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Config(msg) | Self::InstrumentNotFound(msg) => {
                msg.clone()
            }
            Self::Auth(_) => "unauthorized".to_string(),
            Self::Store(_) | Self::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of one account's execution branch.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("broker connection failed: {0}")]
    Connect(BrokerError),

    #[error("symbol disabled")]
    SymbolDisabled,

    #[error("positions unavailable: {0}")]
    PositionsUnavailable(BrokerError),

    #[error("position already exists in {0}")]
    PositionConflict(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("order placement failed: {0}")]
    OrderFailed(BrokerError),

    #[error("order {status} by broker: {reason}")]
    OrderRejected { status: String, reason: String },

    #[error("invalid bracket: {0}")]
    InvalidBracket(String),

    #[error("bracket persist failed: {0}")]
    BracketPersist(StoreError),

    #[error("execution task failed: {0}")]
    TaskFailed(String),
}

impl AccountError {
    /// Pipeline stage label for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::SymbolDisabled => "settings",
            Self::PositionsUnavailable(_) | Self::PositionConflict(_) => "position",
            Self::InvalidQuantity(_) | Self::OrderFailed(_) => "order",
            Self::OrderRejected { .. } => "fill",
            Self::InvalidBracket(_) | Self::BracketPersist(_) => "bracket",
            Self::TaskFailed(_) => "task",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::Validation("price".into()).status_code(), 400);
        assert_eq!(GatewayError::Auth("unknown key".into()).status_code(), 401);
        assert_eq!(GatewayError::Config("no accounts mapped".into()).status_code(), 200);
        assert_eq!(GatewayError::InstrumentNotFound("NIFTY".into()).status_code(), 200);
        assert_eq!(GatewayError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_public_message_hides_detail() {
        let auth = GatewayError::Auth("inactive webhook key wk_9".into());
        assert_eq!(auth.public_message(), "unauthorized");
        let internal = GatewayError::Internal("pool timed out".into());
        assert_eq!(internal.public_message(), INTERNAL_ERROR_MESSAGE);
        assert_eq!(internal.audit_status(), AuditStatus::Error);
    }

    #[test]
    fn test_account_error_messages() {
        assert_eq!(AccountError::SymbolDisabled.to_string(), "symbol disabled");
        assert_eq!(
            AccountError::PositionConflict("NIFTY26MARFUT".into()).to_string(),
            "position already exists in NIFTY26MARFUT"
        );
    }
}

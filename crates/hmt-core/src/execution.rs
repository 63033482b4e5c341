//! Execution-related records written by the gateway.
//!
//! This module provides types for:
//! - Submitted entry orders and their fill
//! - Two-leg standing bracket orders (HMT GTT)
//! - User notifications
//! - The per-request audit log

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::Price;
use crate::order::{Direction, FillSource, OrderStatus, ProductType};

// ============================================================================
// Entry orders
// ============================================================================

/// Market order placed on a linked account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub broker_order_id: String,
    pub tradingsymbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub quantity: u32,
    pub product: ProductType,
    pub status: OrderStatus,
    /// Unknown until polled.
    pub fill_price: Option<Price>,
    pub fill_source: Option<FillSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Bracket orders
// ============================================================================

/// Lifecycle of a standing bracket. The gateway only ever creates `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BracketStatus {
    #[default]
    Active,
    Triggered,
    Cancelled,
}

impl BracketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Triggered => "triggered",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One conditional leg of a bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketLeg {
    pub trigger_price: Price,
    pub limit_price: Price,
    pub quantity: u32,
    pub product: ProductType,
}

/// Provenance of the computed bracket levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketMetadata {
    pub broker_order_id: String,
    /// Price the levels were computed from.
    pub entry_price: Price,
    pub fill_source: FillSource,
    pub signal_price: Price,
    pub signal_atr: Decimal,
    /// `signal_atr * atr_multiplier`.
    pub effective_atr: Decimal,
    pub atr_multiplier: Decimal,
    pub sl_multiplier: Decimal,
    pub target_multiplier: Decimal,
    pub lot_multiplier: u32,
}

/// Two-leg standing exit order ("HMT GTT").
///
/// The legs are mutually exclusive; cancellation of the surviving leg once
/// one fires is handled by the external monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub webhook_key_id: Uuid,
    pub tradingsymbol: String,
    pub exchange: String,
    pub instrument_token: i64,
    pub entry_direction: Direction,
    /// Direction of both exit legs.
    pub exit_direction: Direction,
    pub quantity: u32,
    pub product: ProductType,
    pub stop_loss: BracketLeg,
    pub target: BracketLeg,
    pub status: BracketStatus,
    pub metadata: BracketMetadata,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Signal refused by the platform (window, duplicate).
    Blocked,
    /// Entry placed and bracket created.
    Executed,
    /// Something failed for this user or account.
    Error,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Executed => "executed",
            Self::Error => "error",
        }
    }
}

/// User-facing outcome record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        account_id: Option<Uuid>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            account_id,
            kind,
            title: title.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Audit log
// ============================================================================

/// Final status recorded for a webhook request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Every account executed.
    Success,
    /// Some accounts executed.
    PartialSuccess,
    /// Reached execution but no account executed.
    Failed,
    /// Validation, auth or business rejection.
    Rejected,
    /// Outside the trading window.
    RejectedTimeWindow,
    /// Internal fault.
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::RejectedTimeWindow => "rejected_time_window",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one webhook request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Key as presented, when one could be read from the payload.
    pub webhook_key: Option<String>,
    pub webhook_key_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: AuditStatus,
    pub reason: Option<String>,
    pub payload: serde_json::Value,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuditStatus::RejectedTimeWindow).unwrap(),
            "\"rejected_time_window\""
        );
        assert_eq!(AuditStatus::PartialSuccess.to_string(), "partial_success");
    }

    #[test]
    fn test_notification_new() {
        let user = Uuid::new_v4();
        let n = Notification::new(
            user,
            None,
            NotificationKind::Blocked,
            "Blocked",
            "outside window",
        );
        assert_eq!(n.user_id, user);
        assert_eq!(n.kind.as_str(), "blocked");
        assert!(n.account_id.is_none());
    }
}

//! Webhook keys, linked brokerage accounts and per-symbol settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque credential a signal source uses to trigger trades for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookKey {
    pub id: Uuid,
    /// The secret presented in the webhook payload.
    pub key: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub name: String,
    pub is_active: bool,
    /// Linked accounts this key fans out to.
    #[serde(default)]
    pub account_ids: Vec<Uuid>,
    /// Key-level stop-loss multiplier default.
    #[serde(default)]
    pub sl_multiplier: Option<Decimal>,
    /// Key-level target multiplier default.
    #[serde(default)]
    pub target_multiplier: Option<Decimal>,
    /// Key-level lot multiplier default.
    #[serde(default)]
    pub lot_multiplier: Option<u32>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Brokerage connection. Credentials are managed outside the gateway.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Broker identifier, e.g. "zerodha".
    pub broker_name: String,
    /// Human-readable label shown in notifications.
    #[serde(default)]
    pub label: String,
    pub api_key: String,
    #[serde(default)]
    pub access_token: Option<String>,
    pub is_active: bool,
}

impl LinkedAccount {
    /// Label for messages, falling back to the id.
    pub fn display_name(&self) -> String {
        if self.label.is_empty() {
            self.id.to_string()
        } else {
            self.label.clone()
        }
    }
}

impl fmt::Debug for LinkedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedAccount")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("broker_name", &self.broker_name)
            .field("label", &self.label)
            .field("api_key", &self.api_key)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Per-(user, symbol, account) override of sizing and bracket multipliers.
///
/// `account_id = None` is the user's global row for the symbol. Every
/// multiplier is optional so a row can override a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    #[serde(default)]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub atr_multiplier: Option<Decimal>,
    #[serde(default)]
    pub sl_multiplier: Option<Decimal>,
    #[serde(default)]
    pub target_multiplier: Option<Decimal>,
    #[serde(default)]
    pub lot_multiplier: Option<u32>,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

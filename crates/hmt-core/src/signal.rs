//! Normalized webhook signals and their duplicate-detection fingerprint.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Price;
use crate::order::Direction;

/// A validated inbound signal. Downstream code never sees the raw map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    pub webhook_key: String,
    /// Cash-market underlying, upper-cased.
    pub symbol: String,
    /// Cash exchange, upper-cased.
    pub exchange: String,
    pub direction: Direction,
    /// Reference price at signal time.
    pub price: Price,
    /// Average True Range supplied by the signal source.
    pub atr: Decimal,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    /// Original payload, retained for the audit log.
    pub raw: serde_json::Value,
}

impl NormalizedSignal {
    /// Fingerprint used to claim the (signal, day) slot.
    pub fn fingerprint(&self, webhook_key_id: Uuid, trade_date: NaiveDate) -> SignalFingerprint {
        SignalFingerprint {
            webhook_key_id,
            symbol: self.symbol.clone(),
            direction: self.direction,
            price_bucket: self.price.bucket(),
            trade_date,
        }
    }
}

/// Coarse identity of a logical signal within one trading day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalFingerprint {
    pub webhook_key_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub price_bucket: i64,
    pub trade_date: NaiveDate,
}

/// Uniqueness record proving a fingerprint was claimed.
///
/// Written once per fingerprint; never updated or deleted by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTracker {
    pub id: Uuid,
    pub fingerprint: SignalFingerprint,
    pub created_at: DateTime<Utc>,
}

impl ExecutionTracker {
    pub fn new(fingerprint: SignalFingerprint, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            fingerprint,
            created_at,
        }
    }
}

/// Result of an atomic claim on a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call inserted the tracker row.
    Claimed,
    /// A row for the same fingerprint already existed.
    Duplicate,
}

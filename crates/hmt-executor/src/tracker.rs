//! Duplicate-signal suppression.
//!
//! A signal is identified by its [`hmt_core::SignalFingerprint`] within one
//! trading day. The store's atomic claim is the only source of truth, so the
//! guarantee holds across processes.

use chrono::{DateTime, NaiveDate, Utc};
use hmt_core::{ClaimOutcome, ExecutionTracker, NormalizedSignal};
use hmt_store::Store;
use tracing::info;
use uuid::Uuid;

use crate::error::GatewayResult;

/// Message returned for a suppressed duplicate.
pub const DUPLICATE_SIGNAL_MESSAGE: &str = "duplicate signal";

/// Claim the (signal, trading day) slot for `webhook_key_id`.
pub async fn claim_signal(
    store: &dyn Store,
    signal: &NormalizedSignal,
    webhook_key_id: Uuid,
    trade_date: NaiveDate,
    now: DateTime<Utc>,
) -> GatewayResult<ClaimOutcome> {
    let tracker = ExecutionTracker::new(signal.fingerprint(webhook_key_id, trade_date), now);
    let outcome = store.claim_signal(&tracker).await?;
    if outcome == ClaimOutcome::Duplicate {
        info!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            price_bucket = tracker.fingerprint.price_bucket,
            %trade_date,
            "Duplicate signal suppressed"
        );
    }
    Ok(outcome)
}

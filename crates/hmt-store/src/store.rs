//! Persistence trait.
//!
//! The gateway reads configuration rows (webhook keys, linked accounts,
//! symbol settings, the instrument catalog) and appends execution records.
//! Implementations must make [`Store::claim_signal`] atomic: of any number
//! of concurrent claims on one fingerprint, exactly one observes
//! [`ClaimOutcome::Claimed`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use hmt_core::{
    AuditLogEntry, BracketOrder, ClaimOutcome, ExecutedOrder, ExecutionTracker, FillSource,
    Instrument, LinkedAccount, Notification, OrderStatus, Price, SymbolSettings, WebhookKey,
};
use uuid::Uuid;

use crate::error::StoreResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fill information written back to an [`ExecutedOrder`] after polling.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFillUpdate {
    pub status: OrderStatus,
    pub fill_price: Option<Price>,
    pub fill_source: Option<FillSource>,
    pub updated_at: DateTime<Utc>,
}

pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Look up a webhook key by its secret value (active or not).
    fn find_webhook_key<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<WebhookKey>>>;

    /// Active accounts among `ids`, in the order given.
    fn active_accounts<'a>(
        &'a self,
        ids: &'a [Uuid],
    ) -> BoxFuture<'a, StoreResult<Vec<LinkedAccount>>>;

    fn find_account(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<LinkedAccount>>>;

    /// Every settings row for (user, symbol): the global row and any
    /// account-specific rows.
    fn symbol_settings<'a>(
        &'a self,
        user_id: Uuid,
        symbol: &'a str,
    ) -> BoxFuture<'a, StoreResult<Vec<SymbolSettings>>>;

    /// Futures contracts on `underlying` expiring on or after `on_or_after`,
    /// nearest expiry first, at most `limit` rows.
    fn futures_contracts<'a>(
        &'a self,
        underlying: &'a str,
        on_or_after: NaiveDate,
        limit: usize,
    ) -> BoxFuture<'a, StoreResult<Vec<Instrument>>>;

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn touch_webhook_key(&self, id: Uuid, at: DateTime<Utc>) -> BoxFuture<'_, StoreResult<()>>;

    /// Atomically insert the tracker unless its fingerprint already exists.
    fn claim_signal<'a>(
        &'a self,
        tracker: &'a ExecutionTracker,
    ) -> BoxFuture<'a, StoreResult<ClaimOutcome>>;

    fn insert_executed_order<'a>(
        &'a self,
        order: &'a ExecutedOrder,
    ) -> BoxFuture<'a, StoreResult<()>>;

    fn update_executed_order(
        &self,
        id: Uuid,
        update: OrderFillUpdate,
    ) -> BoxFuture<'_, StoreResult<()>>;

    fn insert_bracket_order<'a>(
        &'a self,
        bracket: &'a BracketOrder,
    ) -> BoxFuture<'a, StoreResult<()>>;

    fn insert_notification<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, StoreResult<()>>;

    fn insert_audit_entry<'a>(&'a self, entry: &'a AuditLogEntry) -> BoxFuture<'a, StoreResult<()>>;
}

/// Dynamic dispatch type alias for stores.
pub type DynStore = Arc<dyn Store>;

//! In-process store.
//!
//! Backs dry runs and tests. Configuration rows can be seeded from a JSON
//! file; execution records are kept in memory and exposed for inspection.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hmt_core::{
    AuditLogEntry, BracketOrder, ClaimOutcome, ExecutedOrder, ExecutionTracker, Instrument,
    LinkedAccount, Notification, SignalFingerprint, SymbolSettings, WebhookKey,
};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{BoxFuture, OrderFillUpdate, Store};

/// Configuration rows loaded at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub webhook_keys: Vec<WebhookKey>,
    pub accounts: Vec<LinkedAccount>,
    pub symbol_settings: Vec<SymbolSettings>,
    pub instruments: Vec<Instrument>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Keyed by the secret value.
    webhook_keys: DashMap<String, WebhookKey>,
    accounts: DashMap<Uuid, LinkedAccount>,
    symbol_settings: RwLock<Vec<SymbolSettings>>,
    instruments: RwLock<Vec<Instrument>>,
    trackers: DashMap<SignalFingerprint, ExecutionTracker>,
    executed_orders: DashMap<Uuid, ExecutedOrder>,
    brackets: Mutex<Vec<BracketOrder>>,
    notifications: Mutex<Vec<Notification>>,
    audit_log: Mutex<Vec<AuditLogEntry>>,
    reject_bracket_writes: AtomicBool,
    reject_audit_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let store = Self::new();
        for key in seed.webhook_keys {
            store.insert_webhook_key(key);
        }
        for account in seed.accounts {
            store.insert_account(account);
        }
        store.symbol_settings.write().extend(seed.symbol_settings);
        store.instruments.write().extend(seed.instruments);
        store
    }

    /// Load seed rows from a JSON file.
    pub fn load_seed(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let seed: SeedData = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            webhook_keys = seed.webhook_keys.len(),
            accounts = seed.accounts.len(),
            instruments = seed.instruments.len(),
            "Loaded store seed"
        );
        Ok(Self::from_seed(seed))
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn insert_webhook_key(&self, key: WebhookKey) {
        self.webhook_keys.insert(key.key.clone(), key);
    }

    pub fn insert_account(&self, account: LinkedAccount) {
        self.accounts.insert(account.id, account);
    }

    pub fn insert_symbol_settings(&self, settings: SymbolSettings) {
        self.symbol_settings.write().push(settings);
    }

    pub fn insert_instrument(&self, instrument: Instrument) {
        self.instruments.write().push(instrument);
    }

    // ------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------

    pub fn reject_bracket_writes(&self, reject: bool) {
        self.reject_bracket_writes.store(reject, Ordering::SeqCst);
    }

    pub fn reject_audit_writes(&self, reject: bool) {
        self.reject_audit_writes.store(reject, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn webhook_key(&self, key: &str) -> Option<WebhookKey> {
        self.webhook_keys.get(key).map(|k| k.clone())
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    pub fn executed_orders(&self) -> Vec<ExecutedOrder> {
        let mut orders: Vec<_> = self.executed_orders.iter().map(|o| o.clone()).collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    pub fn bracket_orders(&self) -> Vec<BracketOrder> {
        self.brackets.lock().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_log.lock().clone()
    }

    fn list_futures(
        &self,
        underlying: &str,
        on_or_after: NaiveDate,
        limit: usize,
    ) -> Vec<Instrument> {
        let mut contracts: Vec<Instrument> = self
            .instruments
            .read()
            .iter()
            .filter(|i| i.is_future() && i.name == underlying && i.expiry >= on_or_after)
            .cloned()
            .collect();
        contracts.sort_by_key(|i| i.expiry);
        contracts.truncate(limit);
        contracts
    }
}

impl Store for MemoryStore {
    fn find_webhook_key<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<WebhookKey>>> {
        let found = self.webhook_key(key);
        Box::pin(async move { Ok(found) })
    }

    fn active_accounts<'a>(
        &'a self,
        ids: &'a [Uuid],
    ) -> BoxFuture<'a, StoreResult<Vec<LinkedAccount>>> {
        let accounts = ids
            .iter()
            .filter_map(|id| self.accounts.get(id).map(|a| a.clone()))
            .filter(|a| a.is_active)
            .collect();
        Box::pin(async move { Ok(accounts) })
    }

    fn find_account(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<LinkedAccount>>> {
        let found = self.accounts.get(&id).map(|a| a.clone());
        Box::pin(async move { Ok(found) })
    }

    fn symbol_settings<'a>(
        &'a self,
        user_id: Uuid,
        symbol: &'a str,
    ) -> BoxFuture<'a, StoreResult<Vec<SymbolSettings>>> {
        let rows = self
            .symbol_settings
            .read()
            .iter()
            .filter(|s| s.user_id == user_id && s.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect();
        Box::pin(async move { Ok(rows) })
    }

    fn futures_contracts<'a>(
        &'a self,
        underlying: &'a str,
        on_or_after: NaiveDate,
        limit: usize,
    ) -> BoxFuture<'a, StoreResult<Vec<Instrument>>> {
        let contracts = self.list_futures(underlying, on_or_after, limit);
        Box::pin(async move { Ok(contracts) })
    }

    fn touch_webhook_key(&self, id: Uuid, at: DateTime<Utc>) -> BoxFuture<'_, StoreResult<()>> {
        for mut key in self.webhook_keys.iter_mut() {
            if key.id == id {
                key.last_used_at = Some(at);
            }
        }
        Box::pin(async move { Ok(()) })
    }

    fn claim_signal<'a>(
        &'a self,
        tracker: &'a ExecutionTracker,
    ) -> BoxFuture<'a, StoreResult<ClaimOutcome>> {
        // The entry holds the shard lock, so check-and-insert is one step.
        let outcome = match self.trackers.entry(tracker.fingerprint.clone()) {
            Entry::Occupied(_) => ClaimOutcome::Duplicate,
            Entry::Vacant(slot) => {
                slot.insert(tracker.clone());
                ClaimOutcome::Claimed
            }
        };
        Box::pin(async move { Ok(outcome) })
    }

    fn insert_executed_order<'a>(
        &'a self,
        order: &'a ExecutedOrder,
    ) -> BoxFuture<'a, StoreResult<()>> {
        self.executed_orders.insert(order.id, order.clone());
        Box::pin(async move { Ok(()) })
    }

    fn update_executed_order(
        &self,
        id: Uuid,
        update: OrderFillUpdate,
    ) -> BoxFuture<'_, StoreResult<()>> {
        if let Some(mut order) = self.executed_orders.get_mut(&id) {
            order.status = update.status;
            order.fill_price = update.fill_price;
            order.fill_source = update.fill_source;
            order.updated_at = update.updated_at;
        }
        Box::pin(async move { Ok(()) })
    }

    fn insert_bracket_order<'a>(
        &'a self,
        bracket: &'a BracketOrder,
    ) -> BoxFuture<'a, StoreResult<()>> {
        let result = if self.reject_bracket_writes.load(Ordering::SeqCst) {
            Err(StoreError::WriteRejected("bracket_orders".to_string()))
        } else {
            self.brackets.lock().push(bracket.clone());
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn insert_notification<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, StoreResult<()>> {
        self.notifications.lock().push(notification.clone());
        Box::pin(async move { Ok(()) })
    }

    fn insert_audit_entry<'a>(
        &'a self,
        entry: &'a AuditLogEntry,
    ) -> BoxFuture<'a, StoreResult<()>> {
        let result = if self.reject_audit_writes.load(Ordering::SeqCst) {
            Err(StoreError::WriteRejected("audit_log".to_string()))
        } else {
            self.audit_log.lock().push(entry.clone());
            Ok(())
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmt_core::Direction;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::sync::Arc;

    fn fingerprint(bucket: i64) -> SignalFingerprint {
        SignalFingerprint {
            webhook_key_id: Uuid::nil(),
            symbol: "NIFTY".to_string(),
            direction: Direction::Buy,
            price_bucket: bucket,
            trade_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
        }
    }

    fn future(name: &str, symbol: &str, expiry: (i32, u32, u32)) -> Instrument {
        Instrument {
            instrument_token: 1,
            tradingsymbol: symbol.to_string(),
            name: name.to_string(),
            exchange: "NFO".to_string(),
            instrument_type: "FUT".to_string(),
            expiry: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2).unwrap(),
            lot_size: 50,
            tick_size: dec!(0.05),
        }
    }

    #[tokio::test]
    async fn test_claim_is_once_per_fingerprint() {
        let store = MemoryStore::new();
        let first = ExecutionTracker::new(fingerprint(24500), Utc::now());
        let second = ExecutionTracker::new(fingerprint(24500), Utc::now());
        let other = ExecutionTracker::new(fingerprint(24501), Utc::now());

        assert_eq!(store.claim_signal(&first).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(store.claim_signal(&second).await.unwrap(), ClaimOutcome::Duplicate);
        assert_eq!(store.claim_signal(&other).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(store.tracker_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let tracker = ExecutionTracker::new(fingerprint(24500), Utc::now());
                    store.claim_signal(&tracker).await.unwrap()
                })
            })
            .collect();

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() == ClaimOutcome::Claimed {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
        assert_eq!(store.tracker_count(), 1);
    }

    #[tokio::test]
    async fn test_futures_contracts_ordered_and_filtered() {
        let store = MemoryStore::new();
        store.insert_instrument(future("NIFTY", "NIFTY26APRFUT", (2026, 4, 30)));
        store.insert_instrument(future("NIFTY", "NIFTY26FEBFUT", (2026, 2, 26)));
        store.insert_instrument(future("NIFTY", "NIFTY26MARFUT", (2026, 3, 26)));
        store.insert_instrument(future("BANKNIFTY", "BANKNIFTY26MARFUT", (2026, 3, 26)));
        let mut option = future("NIFTY", "NIFTY26MAR24500CE", (2026, 3, 26));
        option.instrument_type = "CE".to_string();
        store.insert_instrument(option);

        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let contracts = store.futures_contracts("NIFTY", today, 2).await.unwrap();
        let symbols: Vec<_> = contracts.iter().map(|c| c.tradingsymbol.as_str()).collect();
        assert_eq!(symbols, vec!["NIFTY26MARFUT", "NIFTY26APRFUT"]);
    }

    #[tokio::test]
    async fn test_active_accounts_filters_inactive() {
        let store = MemoryStore::new();
        let active = LinkedAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            broker_name: "zerodha".to_string(),
            label: "a".to_string(),
            api_key: "k".to_string(),
            access_token: Some("t".to_string()),
            is_active: true,
        };
        let inactive = LinkedAccount {
            id: Uuid::new_v4(),
            is_active: false,
            ..active.clone()
        };
        store.insert_account(active.clone());
        store.insert_account(inactive.clone());

        let ids = vec![inactive.id, active.id, Uuid::new_v4()];
        let accounts = store.active_accounts(&ids).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, active.id);
    }

    #[tokio::test]
    async fn test_load_seed_from_file() {
        let user = Uuid::new_v4();
        let account = Uuid::new_v4();
        let seed = serde_json::json!({
            "webhook_keys": [{
                "id": Uuid::new_v4(),
                "key": "wk_1",
                "user_id": user,
                "is_active": true,
                "account_ids": [account],
                "created_at": "2026-01-01T00:00:00Z"
            }],
            "accounts": [{
                "id": account,
                "user_id": user,
                "broker_name": "zerodha",
                "api_key": "kite_key",
                "access_token": "tok",
                "is_active": true
            }]
        });
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{seed}").unwrap();

        let store = MemoryStore::load_seed(file.path()).unwrap();
        let key = store.find_webhook_key("wk_1").await.unwrap().unwrap();
        assert_eq!(key.account_ids, vec![account]);
        assert!(store.find_account(account).await.unwrap().is_some());
        assert!(store.futures_contracts("NIFTY", NaiveDate::MIN, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_touch_webhook_key() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store.insert_webhook_key(WebhookKey {
            id,
            key: "wk_1".to_string(),
            user_id: Uuid::nil(),
            name: String::new(),
            is_active: true,
            account_ids: vec![],
            sl_multiplier: None,
            target_multiplier: None,
            lot_multiplier: None,
            last_used_at: None,
            created_at: Utc::now(),
        });
        let at = Utc::now();
        store.touch_webhook_key(id, at).await.unwrap();
        assert_eq!(store.webhook_key("wk_1").unwrap().last_used_at, Some(at));
    }
}

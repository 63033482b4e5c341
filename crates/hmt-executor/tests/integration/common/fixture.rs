//! In-memory gateway fixture.
//!
//! One user, one webhook key, N linked accounts each backed by its own
//! scripted `MockBroker`, and the NIFTY front and next month futures.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use hmt_broker::{MockBroker, MockBrokerFactory};
use hmt_core::{Instrument, LinkedAccount, Price, SymbolSettings, WebhookKey};
use hmt_executor::{ExecutionConfig, FixedClock, Gateway, TradingWindowConfig};
use hmt_store::MemoryStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

pub const WEBHOOK_KEY: &str = "wk_test_0001";
pub const FRONT_MONTH: &str = "NIFTY26MARFUT";
pub const NEXT_MONTH: &str = "NIFTY26APRFUT";
pub const NIFTY_LOT: u32 = 75;

/// UTC instant for a wall-clock time in India.
pub fn ist(date: (i32, u32, u32), hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Kolkata
        .with_ymd_and_hms(date.0, date.1, date.2, hour, minute, second)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

/// 10:00 IST on a regular trading day before the roll cutoff.
pub fn mid_session() -> DateTime<Utc> {
    ist((2026, 3, 10), 10, 0, 0)
}

pub fn nifty_future(tradingsymbol: &str, token: i64, expiry: NaiveDate) -> Instrument {
    Instrument {
        instrument_token: token,
        tradingsymbol: tradingsymbol.to_string(),
        name: "NIFTY".to_string(),
        exchange: "NFO".to_string(),
        instrument_type: "FUT".to_string(),
        expiry,
        lot_size: NIFTY_LOT,
        tick_size: dec!(0.05),
    }
}

pub fn signal(trade_type: &str, price: Value, atr: Value) -> Value {
    json!({
        "webhook_key": WEBHOOK_KEY,
        "symbol": "NIFTY",
        "trade_type": trade_type,
        "price": price,
        "atr": atr,
        "timeframe": "15"
    })
}

pub fn body(payload: &Value) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap()
}

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub gateway: Gateway,
    pub key: WebhookKey,
    pub accounts: Vec<LinkedAccount>,
    pub brokers: Vec<Arc<MockBroker>>,
}

impl Fixture {
    /// `account_count` accounts whose orders complete at 24510.
    pub fn new(account_count: usize) -> Self {
        let fills = vec![Some(Price::new(dec!(24510))); account_count];
        Self::with_fills(&fills)
    }

    /// One account per entry; `None` means the broker never reports a fill.
    pub fn with_fills(fills: &[Option<Price>]) -> Self {
        let user_id = Uuid::new_v4();
        let store = Arc::new(MemoryStore::new());
        let factory = Arc::new(MockBrokerFactory::new());

        let mut accounts = Vec::new();
        let mut brokers = Vec::new();
        for (i, fill) in fills.iter().enumerate() {
            let account = LinkedAccount {
                id: Uuid::new_v4(),
                user_id,
                broker_name: "zerodha".to_string(),
                label: format!("Account {}", i + 1),
                api_key: format!("api_key_{i}"),
                access_token: Some(format!("token_{i}")),
                is_active: true,
            };
            let broker = Arc::new(match fill {
                Some(price) => MockBroker::filling_at(*price),
                None => MockBroker::new(),
            });
            factory.register(account.id, broker.clone());
            store.insert_account(account.clone());
            accounts.push(account);
            brokers.push(broker);
        }

        let key = WebhookKey {
            id: Uuid::new_v4(),
            key: WEBHOOK_KEY.to_string(),
            user_id,
            name: "tradingview".to_string(),
            is_active: true,
            account_ids: accounts.iter().map(|a| a.id).collect(),
            sl_multiplier: None,
            target_multiplier: None,
            lot_multiplier: None,
            last_used_at: None,
            created_at: ist((2026, 1, 1), 9, 0, 0),
        };
        store.insert_webhook_key(key.clone());

        store.insert_instrument(nifty_future(
            FRONT_MONTH,
            13_238_786,
            NaiveDate::from_ymd_opt(2026, 3, 26).unwrap(),
        ));
        store.insert_instrument(nifty_future(
            NEXT_MONTH,
            13_568_770,
            NaiveDate::from_ymd_opt(2026, 4, 28).unwrap(),
        ));

        let config = ExecutionConfig {
            poll_interval_ms: 1,
            ..ExecutionConfig::default()
        };
        let window = TradingWindowConfig::default().build().unwrap();
        let clock = Arc::new(FixedClock::new(mid_session()));
        let gateway =
            Gateway::new(store.clone(), factory, window, config).with_clock(clock.clone());

        Self {
            store,
            clock,
            gateway,
            key,
            accounts,
            brokers,
        }
    }

    pub fn add_settings(&self, account_id: Option<Uuid>, sl: Option<Decimal>, enabled: bool) {
        self.store.insert_symbol_settings(SymbolSettings {
            id: Uuid::new_v4(),
            user_id: self.key.user_id,
            symbol: "NIFTY".to_string(),
            account_id,
            atr_multiplier: None,
            sl_multiplier: sl,
            target_multiplier: None,
            lot_multiplier: None,
            is_enabled: enabled,
        });
    }
}

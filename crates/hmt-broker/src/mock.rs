//! Scriptable in-process broker for tests and dry runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use hmt_core::{LinkedAccount, OrderStatus, Price};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::client::{BoxFuture, BrokerClient, BrokerFactory};
use crate::error::{BrokerError, BrokerResult};
use crate::types::{LtpQuote, MarketOrderRequest, NetPosition, OrderReport};

/// Mock broker for testing.
///
/// Positions, order placement and order status are scripted; every placed
/// order is recorded for verification.
#[derive(Debug)]
pub struct MockBroker {
    positions: Mutex<BrokerResult<Vec<NetPosition>>>,
    /// Panic inside `positions()` instead of answering.
    positions_panic: AtomicBool,
    /// Error to return from the next placements, if any.
    place_error: Mutex<Option<BrokerError>>,
    /// Status responses consumed in order before `default_status` applies.
    status_script: Mutex<VecDeque<BrokerResult<Option<OrderReport>>>>,
    /// Report template once the script is exhausted (order id is filled in).
    default_status: Mutex<Option<OrderReport>>,
    quotes: Mutex<HashMap<String, LtpQuote>>,
    placed: Mutex<Vec<MarketOrderRequest>>,
    status_calls: AtomicUsize,
    next_order_id: AtomicU64,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBroker {
    /// Create a mock with no positions whose orders never report a fill.
    pub fn new() -> Self {
        Self {
            positions: Mutex::new(Ok(Vec::new())),
            positions_panic: AtomicBool::new(false),
            place_error: Mutex::new(None),
            status_script: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(None),
            quotes: Mutex::new(HashMap::new()),
            placed: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            next_order_id: AtomicU64::new(1),
        }
    }

    /// Orders complete immediately at `price`.
    pub fn filling_at(price: Price) -> Self {
        let broker = Self::new();
        broker.set_default_status(OrderStatus::Complete, Some(price));
        broker
    }

    /// Add a net position.
    pub fn add_position(&self, tradingsymbol: &str, exchange: &str, quantity: i64) {
        if let Ok(positions) = &mut *self.positions.lock() {
            positions.push(NetPosition {
                tradingsymbol: tradingsymbol.to_string(),
                exchange: exchange.to_string(),
                quantity,
                average_price: Default::default(),
                product: "NRML".to_string(),
            });
        }
    }

    /// Make `positions()` fail.
    pub fn fail_positions(&self, error: BrokerError) {
        *self.positions.lock() = Err(error);
    }

    /// Make `positions()` panic, to exercise task isolation.
    pub fn panic_on_positions(&self) {
        self.positions_panic.store(true, Ordering::SeqCst);
    }

    /// Make `place_market_order()` fail.
    pub fn fail_orders(&self, error: BrokerError) {
        *self.place_error.lock() = Some(error);
    }

    /// Queue one `order_status()` response.
    pub fn push_status(&self, result: BrokerResult<Option<OrderReport>>) {
        self.status_script.lock().push_back(result);
    }

    /// Status reported once the script is exhausted.
    pub fn set_default_status(&self, status: OrderStatus, average_price: Option<Price>) {
        *self.default_status.lock() = Some(OrderReport {
            order_id: String::new(),
            status,
            average_price,
            filled_quantity: 0,
            status_message: None,
        });
    }

    pub fn set_quote(
        &self,
        instrument: &str,
        instrument_token: i64,
        last_price: rust_decimal::Decimal,
    ) {
        self.quotes.lock().insert(
            instrument.to_string(),
            LtpQuote {
                instrument_token,
                last_price,
            },
        );
    }

    /// Get recorded orders.
    pub fn placed_orders(&self) -> Vec<MarketOrderRequest> {
        self.placed.lock().clone()
    }

    /// Number of `order_status()` calls made.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

impl BrokerClient for MockBroker {
    fn positions(&self) -> BoxFuture<'_, BrokerResult<Vec<NetPosition>>> {
        if self.positions_panic.load(Ordering::SeqCst) {
            panic!("mock broker: scripted positions panic");
        }
        let result = self.positions.lock().clone();
        Box::pin(async move { result })
    }

    fn place_market_order(&self, order: MarketOrderRequest) -> BoxFuture<'_, BrokerResult<String>> {
        let result = match self.place_error.lock().clone() {
            Some(err) => Err(err),
            None => {
                self.placed.lock().push(order);
                let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
                Ok(format!("MOCK{id:06}"))
            }
        };
        Box::pin(async move { result })
    }

    fn order_status(&self, order_id: String) -> BoxFuture<'_, BrokerResult<Option<OrderReport>>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.status_script.lock().pop_front();
        let result = match scripted {
            Some(result) => result,
            None => Ok(self.default_status.lock().clone().map(|mut report| {
                report.order_id = order_id;
                report
            })),
        };
        Box::pin(async move { result })
    }

    fn ltp(
        &self,
        instruments: Vec<String>,
    ) -> BoxFuture<'_, BrokerResult<HashMap<String, LtpQuote>>> {
        let quotes = self.quotes.lock();
        let result = instruments
            .into_iter()
            .filter_map(|i| quotes.get(&i).cloned().map(|q| (i, q)))
            .collect();
        Box::pin(async move { Ok(result) })
    }
}

/// Hands out a registered [`MockBroker`] per account id.
#[derive(Debug, Default)]
pub struct MockBrokerFactory {
    brokers: Mutex<HashMap<Uuid, Arc<MockBroker>>>,
}

impl MockBrokerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the broker returned for `account_id`.
    pub fn register(&self, account_id: Uuid, broker: Arc<MockBroker>) {
        self.brokers.lock().insert(account_id, broker);
    }
}

impl BrokerFactory for MockBrokerFactory {
    fn connect(&self, account: &LinkedAccount) -> BrokerResult<Arc<dyn BrokerClient>> {
        self.brokers
            .lock()
            .get(&account.id)
            .cloned()
            .map(|b| b as Arc<dyn BrokerClient>)
            .ok_or_else(|| {
                BrokerError::MissingCredentials(format!("no broker for account {}", account.id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmt_core::{Direction, ProductType};
    use rust_decimal_macros::dec;

    fn order() -> MarketOrderRequest {
        MarketOrderRequest {
            tradingsymbol: "NIFTY26MARFUT".to_string(),
            exchange: "NFO".to_string(),
            direction: Direction::Buy,
            quantity: 50,
            product: ProductType::Nrml,
            tag: None,
        }
    }

    #[tokio::test]
    async fn test_mock_records_orders() {
        let broker = MockBroker::new();
        let id = broker.place_market_order(order()).await.unwrap();
        assert_eq!(id, "MOCK000001");
        assert_eq!(broker.placed_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_status_script_then_default() {
        let broker = MockBroker::filling_at(Price::new(dec!(100)));
        broker.push_status(Ok(None));
        assert!(broker.order_status("X".to_string()).await.unwrap().is_none());
        let report = broker.order_status("X".to_string()).await.unwrap().unwrap();
        assert_eq!(report.order_id, "X");
        assert_eq!(report.filled_price(), Some(Price::new(dec!(100))));
        assert_eq!(broker.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let broker = MockBroker::new();
        broker.fail_orders(BrokerError::Http("boom".to_string()));
        assert!(broker.place_market_order(order()).await.is_err());
        assert!(broker.placed_orders().is_empty());

        broker.fail_positions(BrokerError::Http("down".to_string()));
        assert!(broker.positions().await.is_err());
    }
}

//! Broker capability trait.
//!
//! The gateway talks to brokerage accounts only through this interface:
//! - `positions`: net positions for the account
//! - `place_market_order`: submit an entry order
//! - `order_status`: poll an order by id
//! - `ltp`: last traded prices
//!
//! Any adapter implementing [`BrokerClient`] is substitutable, which keeps
//! the execution pipeline testable with [`crate::MockBroker`].

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use hmt_core::LinkedAccount;

use crate::error::BrokerResult;
use crate::types::{LtpQuote, MarketOrderRequest, NetPosition, OrderReport};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Broker operations bound to a single account's credentials.
pub trait BrokerClient: Send + Sync {
    /// Net positions currently held by the account.
    fn positions(&self) -> BoxFuture<'_, BrokerResult<Vec<NetPosition>>>;

    /// Submit a market order. Returns the broker order id.
    fn place_market_order(&self, order: MarketOrderRequest) -> BoxFuture<'_, BrokerResult<String>>;

    /// Latest known state of an order, `None` if the broker has no record yet.
    fn order_status(&self, order_id: String) -> BoxFuture<'_, BrokerResult<Option<OrderReport>>>;

    /// Last traded price for `EXCHANGE:SYMBOL` keys.
    fn ltp(
        &self,
        instruments: Vec<String>,
    ) -> BoxFuture<'_, BrokerResult<HashMap<String, LtpQuote>>>;
}

/// Builds a [`BrokerClient`] for a linked account.
pub trait BrokerFactory: Send + Sync {
    fn connect(&self, account: &LinkedAccount) -> BrokerResult<Arc<dyn BrokerClient>>;
}

/// Dynamic dispatch type alias for broker factories.
pub type DynBrokerFactory = Arc<dyn BrokerFactory>;

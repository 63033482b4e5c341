//! Broker capability interface for the HMT signal gateway.
//!
//! Brokerage connectivity is consumed, not implemented, by the gateway.
//! This crate defines the narrow interface it needs and ships:
//! - [`KiteClient`] / [`KiteFactory`]: Kite Connect v3 REST adapter
//! - [`MockBroker`] / [`MockBrokerFactory`]: scriptable test double

pub mod client;
pub mod error;
pub mod kite;
pub mod mock;
pub mod types;

pub use client::{BoxFuture, BrokerClient, BrokerFactory, DynBrokerFactory};
pub use error::{BrokerError, BrokerResult};
pub use kite::{KiteClient, KiteFactory, DEFAULT_API_BASE_URL};
pub use mock::{MockBroker, MockBrokerFactory};
pub use types::{LtpQuote, MarketOrderRequest, NetPosition, OrderReport};

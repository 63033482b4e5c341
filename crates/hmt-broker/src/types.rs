//! Broker request and response types.

use hmt_core::{Direction, OrderStatus, Price, ProductType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Net position in one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetPosition {
    pub tradingsymbol: String,
    pub exchange: String,
    /// Signed net quantity: positive long, negative short.
    pub quantity: i64,
    #[serde(default)]
    pub average_price: Decimal,
    #[serde(default)]
    pub product: String,
}

/// Entry market order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub tradingsymbol: String,
    pub exchange: String,
    pub direction: Direction,
    pub quantity: u32,
    pub product: ProductType,
    /// Short free-form tag the broker echoes back.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Snapshot of an order's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReport {
    pub order_id: String,
    pub status: OrderStatus,
    /// Average fill price; zero or absent until something fills.
    #[serde(default)]
    pub average_price: Option<Price>,
    #[serde(default)]
    pub filled_quantity: u32,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl OrderReport {
    /// Completed with a usable average price.
    pub fn filled_price(&self) -> Option<Price> {
        match (self.status, self.average_price) {
            (OrderStatus::Complete, Some(px)) if px.is_positive() => Some(px),
            _ => None,
        }
    }
}

/// Last traded price for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtpQuote {
    pub instrument_token: i64,
    pub last_price: Decimal,
}

//! Core domain types for the HMT signal gateway.
//!
//! This crate provides fundamental types used throughout the gateway:
//! - `Price`: Precision-safe price type
//! - `Direction`, `ProductType`, `OrderStatus`: Trading enums
//! - `TradingWindow`: Time-of-day admission control in the exchange timezone
//! - `WebhookKey`, `LinkedAccount`, `SymbolSettings`: Read-side configuration
//! - `ExecutedOrder`, `BracketOrder`, `Notification`, `AuditLogEntry`: Records
//!   the gateway writes

pub mod account;
pub mod decimal;
pub mod error;
pub mod execution;
pub mod instrument;
pub mod order;
pub mod signal;
pub mod trading_session;

pub use account::{LinkedAccount, SymbolSettings, WebhookKey};
pub use decimal::Price;
pub use error::{CoreError, Result};
pub use instrument::{Instrument, FUTURES_INSTRUMENT_TYPE};
pub use order::{Direction, FillSource, OrderStatus, ProductType};
pub use signal::{ClaimOutcome, ExecutionTracker, NormalizedSignal, SignalFingerprint};
pub use trading_session::{TradingWindow, WindowCheck};

// Execution records
pub use execution::{
    AuditLogEntry, AuditStatus, BracketLeg, BracketMetadata, BracketOrder, BracketStatus,
    ExecutedOrder, Notification, NotificationKind,
};

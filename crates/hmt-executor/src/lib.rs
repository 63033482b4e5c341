//! Signal-to-bracket execution pipeline for the HMT signal gateway.
//!
//! # Key Components
//!
//! - [`Gateway`]: webhook entry point, one audit entry per request
//! - [`normalize`]: payload validation into a typed signal
//! - [`resolve_contract`]: futures roll rule (nearest until the 15th)
//! - [`claim_signal`]: once-per-day duplicate suppression
//! - [`execute_all`]: parallel per-account order, fill poll and bracket
//! - [`FillPoller`]: bounded status polling with signal-price fallback
//! - [`compute_levels`]: ATR-scaled stop-loss and target

pub mod audit;
pub mod bracket;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod instrument;
pub mod normalizer;
pub mod notifier;
pub mod orchestrator;
pub mod poller;
pub mod resolver;
pub mod response;
pub mod settings;
pub mod tracker;

// Error types
pub use error::{AccountError, GatewayError, GatewayResult, INTERNAL_ERROR_MESSAGE};

// Entry point
pub use gateway::{Gateway, GatewayResponse};
pub use response::{AccountResult, WebhookResponse};

// Configuration
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ExecutionConfig, TradingWindowConfig};

// Pipeline steps
pub use audit::{AuditContext, AuditLogger};
pub use bracket::{build_bracket, compute_levels, BracketLevels, BracketSource};
pub use instrument::{resolve_contract, select_contract, ROLL_CUTOFF_DAY};
pub use normalizer::{normalize, peek_webhook_key};
pub use notifier::Notifier;
pub use orchestrator::{execute_all, ExecutionContext};
pub use poller::{FillOutcome, FillPoller};
pub use resolver::{resolve_accounts, resolve_key, NO_ACCOUNTS_MESSAGE};
pub use settings::{resolve_settings, EffectiveSettings};
pub use tracker::{claim_signal, DUPLICATE_SIGNAL_MESSAGE};

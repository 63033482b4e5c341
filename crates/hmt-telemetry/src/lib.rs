//! Prometheus metrics and structured logging for the HMT signal gateway.
//!
//! - Prometheus metrics for webhook outcomes, orders, brackets and fill polling
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_LOG_FILTER};
pub use metrics::Metrics;

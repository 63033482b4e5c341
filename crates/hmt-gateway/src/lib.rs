//! HMT signal gateway.
//!
//! Wires the components into one process:
//! - Layered configuration (TOML + `HMT__` environment overrides)
//! - Store backend (memory or PostgreSQL)
//! - Kite broker adapter
//! - Webhook HTTP server with graceful shutdown

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, StoreBackend, DEFAULT_CONFIG_PATH};
pub use error::{AppError, AppResult};

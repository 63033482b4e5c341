//! hmt-server - HTTP surface for the HMT signal gateway.
//!
//! # Routes
//!
//! ```text
//! POST /webhook       signal in, per-account execution summary out
//! POST /api/webhook   same handler, prefixed path
//! GET  /api/ltp       last traded price for a linked account (basic auth, 503 when unset)
//! GET  /health        liveness and version
//! GET  /metrics       Prometheus text exposition
//! ```
//!
//! All routes allow any origin.

mod auth;
mod config;
mod error;
mod handlers;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{create_router, run_server, AppState};

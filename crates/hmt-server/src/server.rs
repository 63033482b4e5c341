//! HTTP server implementation using axum.

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use hmt_executor::Gateway;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handlers;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) gateway: Arc<Gateway>,
    pub(crate) config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>, config: ServerConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/webhook", post(handlers::webhook))
        .route("/api/webhook", post(handlers::webhook))
        .route("/api/ltp", get(handlers::ltp))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` is cancelled; in-flight requests are drained.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> ServerResult<()> {
    let addr = state.config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(%addr, "Starting webhook server");
    if !state.config.auth_enabled() {
        warn!("Server credentials not configured; /api/ltp is disabled");
    }

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Webhook server stopped");
    Ok(())
}

//! Application wiring.
//!
//! Builds the store, broker factory and gateway from [`AppConfig`], then
//! serves HTTP until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use hmt_broker::{DynBrokerFactory, KiteFactory};
use hmt_executor::Gateway;
use hmt_server::{run_server, AppState};
use hmt_store::{DynStore, MemoryStore, PgStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AppConfig, StoreBackend};
use crate::error::{AppError, AppResult};

/// Main application.
pub struct Application {
    config: AppConfig,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Open the configured persistence backend.
    pub async fn build_store(&self) -> AppResult<DynStore> {
        let cfg = &self.config.store;
        match cfg.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory store; nothing survives a restart");
                let store = match &cfg.seed_file {
                    Some(path) => MemoryStore::load_seed(path)?,
                    None => MemoryStore::new(),
                };
                Ok(Arc::new(store))
            }
            StoreBackend::Postgres => {
                let url = cfg.database_url.as_deref().ok_or_else(|| {
                    AppError::Config("store.database_url is required".to_string())
                })?;
                let store = PgStore::connect(url, cfg.max_connections).await?;
                if cfg.run_migrations {
                    store.migrate().await?;
                }
                Ok(Arc::new(store))
            }
        }
    }

    pub fn build_brokers(&self) -> AppResult<DynBrokerFactory> {
        let cfg = &self.config.broker;
        let factory = KiteFactory::new(
            cfg.api_base_url.clone(),
            Some(Duration::from_millis(cfg.timeout_ms)),
        )?;
        Ok(Arc::new(factory))
    }

    pub async fn build_gateway(&self) -> AppResult<Gateway> {
        let store = self.build_store().await?;
        let brokers = self.build_brokers()?;
        let window = self.config.trading_window.build()?;
        info!(
            window = %window.describe(),
            timezone = %window.timezone(),
            poll_interval_ms = self.config.execution.poll_interval_ms,
            poll_max_attempts = self.config.execution.poll_max_attempts,
            "Gateway configured"
        );
        Ok(Gateway::new(
            store,
            brokers,
            window,
            self.config.execution.clone(),
        ))
    }

    /// Serve until Ctrl-C; in-flight requests finish first.
    pub async fn run(self) -> AppResult<()> {
        let gateway = self.build_gateway().await?;
        let state = AppState::new(Arc::new(gateway), self.config.server.clone());

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
            trigger.cancel();
        });

        run_server(state, shutdown).await?;
        info!("Application stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[tokio::test]
    async fn test_memory_store_loads_example_seed() {
        let seed = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/seed.example.json");
        let mut config = AppConfig::default();
        config.store.seed_file = Some(seed.to_string_lossy().into_owned());
        let app = Application::new(config);

        let store = app.build_store().await.unwrap();

        let key = store.find_webhook_key("wk_demo_nifty").await.unwrap().unwrap();
        assert!(key.is_active);
        let accounts = store.active_accounts(&key.account_ids).await.unwrap();
        assert_eq!(accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_seed_file_fails() {
        let mut config = AppConfig::default();
        config.store.seed_file = Some("/nonexistent/seed.json".to_string());

        let result = Application::new(config).build_store().await;

        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_build_gateway_with_defaults() {
        let app = Application::new(AppConfig::default());
        assert!(app.build_gateway().await.is_ok());
    }
}

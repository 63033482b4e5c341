//! Application configuration.
//!
//! Load order (later wins):
//! 1. Serde defaults for every field
//! 2. The TOML file given by `--config`, `HMT_CONFIG` or `config/default.toml`
//! 3. Environment variables `HMT__<SECTION>__<FIELD>`, e.g. `HMT__SERVER__PORT`

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use hmt_broker::DEFAULT_API_BASE_URL;
use hmt_executor::{ExecutionConfig, TradingWindowConfig};
use hmt_server::ServerConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process maps, optionally seeded from JSON. Not durable.
    #[default]
    Memory,
    /// PostgreSQL via sqlx.
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// JSON seed file for the memory backend.
    #[serde(default)]
    pub seed_file: Option<String>,
    /// Connection string for the postgres backend.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Pool size. Default: 10.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Apply embedded migrations at startup. Default: true.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_run_migrations() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            seed_file: None,
            database_url: None,
            max_connections: default_max_connections(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// Brokerage REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Per-request timeout (ms). Default: 10,000.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive; `RUST_LOG` still wins when set.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub trading_window: TradingWindowConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from a TOML file with environment overrides.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("HMT")
                    .prefix_separator("__")
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse TOML text without environment overrides.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.trading_window.build()?;
        self.server.socket_addr()?;

        if self.execution.poll_max_attempts == 0 {
            return Err(AppError::Config(
                "execution.poll_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.execution.default_exchange.trim().is_empty() {
            return Err(AppError::Config(
                "execution.default_exchange must not be empty".to_string(),
            ));
        }
        let multipliers = [
            ("default_atr_multiplier", self.execution.default_atr_multiplier),
            ("default_sl_multiplier", self.execution.default_sl_multiplier),
            ("default_target_multiplier", self.execution.default_target_multiplier),
        ];
        for (name, value) in multipliers {
            if value <= Decimal::ZERO {
                return Err(AppError::Config(format!(
                    "execution.{name} must be positive, got {value}"
                )));
            }
        }
        if self.execution.default_lot_multiplier == 0 {
            return Err(AppError::Config(
                "execution.default_lot_multiplier must be at least 1".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres
            && self.store.database_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(AppError::Config(
                "store.database_url is required for the postgres backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for printing.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.server.password.is_empty() {
            copy.server.password = "********".to_string();
        }
        if copy.store.database_url.is_some() {
            copy.store.database_url = Some("********".to_string());
        }
        copy
    }
}

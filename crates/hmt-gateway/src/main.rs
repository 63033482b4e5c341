//! HMT signal gateway - Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use hmt_gateway::{AppConfig, Application, DEFAULT_CONFIG_PATH};
use tracing::info;

/// Webhook-driven futures execution with standing bracket exits
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via HMT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Validate the configuration, print the effective values and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI arg > HMT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("HMT_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    hmt_telemetry::init_logging(config.telemetry.log_level.as_deref())?;
    info!(config_path = %config_path, "Starting HMT gateway v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    if args.check_config {
        let rendered = toml::to_string_pretty(&config.redacted())
            .context("rendering effective configuration")?;
        println!("{rendered}");
        info!("Configuration is valid");
        return Ok(());
    }

    Application::new(config).run().await?;
    Ok(())
}

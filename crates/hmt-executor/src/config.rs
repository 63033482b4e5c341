//! Execution pipeline configuration.

use std::time::Duration;

use hmt_core::{ProductType, TradingWindow};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Admission window in the exchange's local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingWindowConfig {
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// First accepted minute, "HH:MM".
    #[serde(default = "default_open")]
    pub open: String,
    /// Last accepted minute, "HH:MM".
    #[serde(default = "default_close")]
    pub close: String,
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_open() -> String {
    "09:30".to_string()
}

fn default_close() -> String {
    "15:00".to_string()
}

impl Default for TradingWindowConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            open: default_open(),
            close: default_close(),
        }
    }
}

impl TradingWindowConfig {
    pub fn build(&self) -> hmt_core::Result<TradingWindow> {
        TradingWindow::parse(&self.timezone, &self.open, &self.close)
    }
}

/// Order submission, fill polling and bracket defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Delay before each order status check (ms). Default: 1,000.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Status checks before falling back to the signal price. Default: 5.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default)]
    pub product: ProductType,
    /// Cash exchange assumed when the payload omits one.
    #[serde(default = "default_exchange")]
    pub default_exchange: String,
    #[serde(default = "default_atr_multiplier")]
    pub default_atr_multiplier: Decimal,
    #[serde(default = "default_sl_multiplier")]
    pub default_sl_multiplier: Decimal,
    #[serde(default = "default_target_multiplier")]
    pub default_target_multiplier: Decimal,
    #[serde(default = "default_lot_multiplier")]
    pub default_lot_multiplier: u32,
    /// Tag attached to entry orders (broker limit: 20 chars).
    #[serde(default = "default_order_tag")]
    pub order_tag: String,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_poll_max_attempts() -> u32 {
    5
}

fn default_exchange() -> String {
    "NSE".to_string()
}

fn default_atr_multiplier() -> Decimal {
    Decimal::ONE
}

fn default_sl_multiplier() -> Decimal {
    Decimal::new(15, 1) // 1.5
}

fn default_target_multiplier() -> Decimal {
    Decimal::new(20, 1) // 2.0
}

fn default_lot_multiplier() -> u32 {
    1
}

fn default_order_tag() -> String {
    "hmtgw".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            product: ProductType::default(),
            default_exchange: default_exchange(),
            default_atr_multiplier: default_atr_multiplier(),
            default_sl_multiplier: default_sl_multiplier(),
            default_target_multiplier: default_target_multiplier(),
            default_lot_multiplier: default_lot_multiplier(),
            order_tag: default_order_tag(),
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: ExecutionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ExecutionConfig::default());
        assert_eq!(config.default_sl_multiplier, dec!(1.5));
        assert_eq!(config.default_target_multiplier, dec!(2.0));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.product, ProductType::Nrml);
    }

    #[test]
    fn test_window_config_builds() {
        let window = TradingWindowConfig::default().build().unwrap();
        assert_eq!(window.describe(), "09:30-15:00");

        let inverted = TradingWindowConfig {
            open: "15:00".to_string(),
            close: "09:30".to_string(),
            ..Default::default()
        };
        assert!(inverted.build().is_err());
    }
}

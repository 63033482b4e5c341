//! Effective sizing and bracket multipliers per account.
//!
//! Each field resolves independently: account-specific symbol row, then the
//! user's global symbol row, then the webhook key default, then the
//! configured default. Non-positive values at any layer are skipped.

use hmt_core::{SymbolSettings, WebhookKey};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::config::ExecutionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveSettings {
    pub atr_multiplier: Decimal,
    pub sl_multiplier: Decimal,
    pub target_multiplier: Decimal,
    pub lot_multiplier: u32,
    pub is_enabled: bool,
}

pub fn resolve_settings(
    rows: &[SymbolSettings],
    account_id: Uuid,
    key: &WebhookKey,
    config: &ExecutionConfig,
) -> EffectiveSettings {
    let account_row = rows.iter().find(|r| r.account_id == Some(account_id));
    let global_row = rows.iter().find(|r| r.account_id.is_none());

    let positive = |m: &Decimal| *m > Decimal::ZERO;
    let layered = |field: fn(&SymbolSettings) -> Option<Decimal>| {
        account_row
            .and_then(field)
            .filter(positive)
            .or_else(|| global_row.and_then(field).filter(positive))
    };

    let lot_multiplier = account_row
        .and_then(|r| r.lot_multiplier)
        .filter(|m| *m > 0)
        .or_else(|| global_row.and_then(|r| r.lot_multiplier).filter(|m| *m > 0))
        .or_else(|| key.lot_multiplier.filter(|m| *m > 0))
        .unwrap_or(config.default_lot_multiplier);

    EffectiveSettings {
        atr_multiplier: layered(|r| r.atr_multiplier).unwrap_or(config.default_atr_multiplier),
        sl_multiplier: layered(|r| r.sl_multiplier)
            .or_else(|| key.sl_multiplier.filter(positive))
            .unwrap_or(config.default_sl_multiplier),
        target_multiplier: layered(|r| r.target_multiplier)
            .or_else(|| key.target_multiplier.filter(positive))
            .unwrap_or(config.default_target_multiplier),
        lot_multiplier,
        is_enabled: account_row
            .or(global_row)
            .map(|r| r.is_enabled)
            .unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn key() -> WebhookKey {
        WebhookKey {
            id: Uuid::new_v4(),
            key: "wk_1".to_string(),
            user_id: Uuid::nil(),
            name: String::new(),
            is_active: true,
            account_ids: vec![],
            sl_multiplier: None,
            target_multiplier: None,
            lot_multiplier: None,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    fn row(account_id: Option<Uuid>) -> SymbolSettings {
        SymbolSettings {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            symbol: "NIFTY".to_string(),
            account_id,
            atr_multiplier: None,
            sl_multiplier: None,
            target_multiplier: None,
            lot_multiplier: None,
            is_enabled: true,
        }
    }

    #[test]
    fn test_defaults_without_rows() {
        let settings = resolve_settings(&[], Uuid::new_v4(), &key(), &ExecutionConfig::default());
        assert_eq!(settings.atr_multiplier, dec!(1));
        assert_eq!(settings.sl_multiplier, dec!(1.5));
        assert_eq!(settings.target_multiplier, dec!(2.0));
        assert_eq!(settings.lot_multiplier, 1);
        assert!(settings.is_enabled);
    }

    #[test]
    fn test_field_level_precedence() {
        let account = Uuid::new_v4();
        let mut specific = row(Some(account));
        specific.sl_multiplier = Some(dec!(1.0));
        let mut global = row(None);
        global.sl_multiplier = Some(dec!(3.0));
        global.lot_multiplier = Some(2);
        global.atr_multiplier = Some(dec!(0.5));
        let mut key = key();
        key.target_multiplier = Some(dec!(4));
        key.lot_multiplier = Some(5);

        let settings =
            resolve_settings(&[global, specific], account, &key, &ExecutionConfig::default());
        assert_eq!(settings.sl_multiplier, dec!(1.0)); // account row
        assert_eq!(settings.lot_multiplier, 2); // global row over key
        assert_eq!(settings.atr_multiplier, dec!(0.5)); // global row
        assert_eq!(settings.target_multiplier, dec!(4)); // key default
    }

    #[test]
    fn test_non_positive_key_defaults_fall_through() {
        let mut key = key();
        key.sl_multiplier = Some(dec!(0));
        key.target_multiplier = Some(dec!(-1));

        let settings = resolve_settings(&[], Uuid::new_v4(), &key, &ExecutionConfig::default());
        assert_eq!(settings.sl_multiplier, dec!(1.5));
        assert_eq!(settings.target_multiplier, dec!(2.0));
    }

    #[test]
    fn test_zero_on_account_row_falls_back_to_next_layer() {
        let account = Uuid::new_v4();
        let mut specific = row(Some(account));
        specific.lot_multiplier = Some(0);
        specific.sl_multiplier = Some(dec!(0));
        let mut global = row(None);
        global.lot_multiplier = Some(3);
        let mut key = key();
        key.lot_multiplier = Some(2);
        key.sl_multiplier = Some(dec!(1.2));

        let settings =
            resolve_settings(&[specific, global], account, &key, &ExecutionConfig::default());
        assert_eq!(settings.lot_multiplier, 3);
        assert_eq!(settings.sl_multiplier, dec!(1.2));
    }

    #[test]
    fn test_other_accounts_rows_ignored() {
        let mut other = row(Some(Uuid::new_v4()));
        other.is_enabled = false;
        other.lot_multiplier = Some(9);
        let config = ExecutionConfig::default();
        let settings = resolve_settings(&[other], Uuid::new_v4(), &key(), &config);
        assert!(settings.is_enabled);
        assert_eq!(settings.lot_multiplier, 1);
    }

    #[test]
    fn test_disabled_account_row_wins() {
        let account = Uuid::new_v4();
        let mut specific = row(Some(account));
        specific.is_enabled = false;
        let config = ExecutionConfig::default();
        let settings = resolve_settings(&[row(None), specific], account, &key(), &config);
        assert!(!settings.is_enabled);
    }
}

//! Bracket (stop-loss + target) level calculation and record building.

use chrono::{DateTime, Utc};
use hmt_core::{
    BracketLeg, BracketMetadata, BracketOrder, BracketStatus, Direction, FillSource, Instrument,
    NormalizedSignal, Price, ProductType,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AccountError;
use crate::settings::EffectiveSettings;

/// Exit levels for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketLevels {
    pub stop_loss: Price,
    pub target: Price,
    /// `atr * atr_multiplier`.
    pub effective_atr: Decimal,
}

/// Compute stop-loss and target around `entry`.
///
/// BUY: `SL = F - eATR*sl`, `TGT = F + eATR*tgt`; SELL mirrors both.
/// Levels are rounded to `tick_size` and must stay positive.
pub fn compute_levels(
    direction: Direction,
    entry: Price,
    atr: Decimal,
    settings: &EffectiveSettings,
    tick_size: Decimal,
) -> Result<BracketLevels, AccountError> {
    let effective_atr = atr * settings.atr_multiplier;
    let stop_distance = effective_atr * settings.sl_multiplier;
    let target_distance = effective_atr * settings.target_multiplier;

    let (stop_loss, target) = match direction {
        Direction::Buy => (entry - stop_distance, entry + target_distance),
        Direction::Sell => (entry + stop_distance, entry - target_distance),
    };
    let stop_loss = stop_loss.round_to_tick(tick_size);
    let target = target.round_to_tick(tick_size);

    if !stop_loss.is_positive() || !target.is_positive() {
        return Err(AccountError::InvalidBracket(format!(
            "non-positive level (stop_loss {stop_loss}, target {target})"
        )));
    }

    Ok(BracketLevels {
        stop_loss,
        target,
        effective_atr,
    })
}

/// Inputs for a bracket record beyond the computed levels.
#[derive(Debug, Clone)]
pub struct BracketSource<'a> {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub webhook_key_id: Uuid,
    pub signal: &'a NormalizedSignal,
    pub instrument: &'a Instrument,
    pub broker_order_id: &'a str,
    pub quantity: u32,
    pub product: ProductType,
    pub entry_price: Price,
    pub fill_source: FillSource,
    pub settings: &'a EffectiveSettings,
}

/// Build the standing two-leg exit order for a filled entry.
///
/// Both legs exit in the opposite direction with the full entry quantity.
pub fn build_bracket(
    source: &BracketSource<'_>,
    levels: &BracketLevels,
    created_at: DateTime<Utc>,
) -> BracketOrder {
    let leg = |price: Price| BracketLeg {
        trigger_price: price,
        limit_price: price,
        quantity: source.quantity,
        product: source.product,
    };

    BracketOrder {
        id: Uuid::new_v4(),
        user_id: source.user_id,
        account_id: source.account_id,
        webhook_key_id: source.webhook_key_id,
        tradingsymbol: source.instrument.tradingsymbol.clone(),
        exchange: source.instrument.exchange.clone(),
        instrument_token: source.instrument.instrument_token,
        entry_direction: source.signal.direction,
        exit_direction: source.signal.direction.opposite(),
        quantity: source.quantity,
        product: source.product,
        stop_loss: leg(levels.stop_loss),
        target: leg(levels.target),
        status: BracketStatus::Active,
        metadata: BracketMetadata {
            broker_order_id: source.broker_order_id.to_string(),
            entry_price: source.entry_price,
            fill_source: source.fill_source,
            signal_price: source.signal.price,
            signal_atr: source.signal.atr,
            effective_atr: levels.effective_atr,
            atr_multiplier: source.settings.atr_multiplier,
            sl_multiplier: source.settings.sl_multiplier,
            target_multiplier: source.settings.target_multiplier,
            lot_multiplier: source.settings.lot_multiplier,
        },
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn settings(atr: Decimal, sl: Decimal, tgt: Decimal) -> EffectiveSettings {
        EffectiveSettings {
            atr_multiplier: atr,
            sl_multiplier: sl,
            target_multiplier: tgt,
            lot_multiplier: 1,
            is_enabled: true,
        }
    }

    #[test]
    fn test_buy_levels() {
        let levels = compute_levels(
            Direction::Buy,
            Price::new(dec!(24510)),
            dec!(100),
            &settings(dec!(1), dec!(1.5), dec!(2.0)),
            dec!(0.05),
        )
        .unwrap();
        assert_eq!(levels.stop_loss, Price::new(dec!(24360)));
        assert_eq!(levels.target, Price::new(dec!(24710)));
        assert_eq!(levels.effective_atr, dec!(100));
    }

    #[test]
    fn test_sell_levels_mirror_buy() {
        let s = settings(dec!(1), dec!(1.5), dec!(2.0));
        let entry = Price::new(dec!(1000));
        let buy = compute_levels(Direction::Buy, entry, dec!(10), &s, dec!(0.05)).unwrap();
        let sell = compute_levels(Direction::Sell, entry, dec!(10), &s, dec!(0.05)).unwrap();
        assert_eq!(sell.stop_loss, Price::new(dec!(1015)));
        assert_eq!(sell.target, Price::new(dec!(980)));
        assert_eq!(
            buy.stop_loss.inner() + sell.stop_loss.inner(),
            dec!(2000),
            "stop distances are symmetric"
        );
        assert_eq!(buy.target.inner() + sell.target.inner(), dec!(2000));
    }

    #[test]
    fn test_atr_multiplier_scales_distance_and_rounds_to_tick() {
        let levels = compute_levels(
            Direction::Buy,
            Price::new(dec!(1000)),
            dec!(3.33),
            &settings(dec!(1.1), dec!(1.5), dec!(2)),
            dec!(0.05),
        )
        .unwrap();
        // eATR = 3.663, SL = 994.5055 -> 994.50, TGT = 1007.326 -> 1007.35
        assert_eq!(levels.stop_loss, Price::new(dec!(994.50)));
        assert_eq!(levels.target, Price::new(dec!(1007.35)));
    }

    #[test]
    fn test_non_positive_level_is_error() {
        let err = compute_levels(
            Direction::Buy,
            Price::new(dec!(100)),
            dec!(80),
            &settings(dec!(1), dec!(1.5), dec!(2)),
            dec!(0.05),
        )
        .unwrap_err();
        assert!(matches!(err, AccountError::InvalidBracket(_)));
    }

    #[test]
    fn test_build_bracket_exits_opposite_with_full_quantity() {
        let signal = NormalizedSignal {
            webhook_key: "wk_1".to_string(),
            symbol: "NIFTY".to_string(),
            exchange: "NSE".to_string(),
            direction: Direction::Sell,
            price: Price::new(dec!(24500)),
            atr: dec!(100),
            timeframe: None,
            event_time: None,
            raw: serde_json::Value::Null,
        };
        let instrument = Instrument {
            instrument_token: 42,
            tradingsymbol: "NIFTY26MARFUT".to_string(),
            name: "NIFTY".to_string(),
            exchange: "NFO".to_string(),
            instrument_type: "FUT".to_string(),
            expiry: NaiveDate::from_ymd_opt(2026, 3, 26).unwrap(),
            lot_size: 50,
            tick_size: dec!(0.05),
        };
        let s = settings(dec!(1), dec!(1.5), dec!(2));
        let source = BracketSource {
            user_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            webhook_key_id: Uuid::new_v4(),
            signal: &signal,
            instrument: &instrument,
            broker_order_id: "230405000123",
            quantity: 100,
            product: ProductType::Nrml,
            entry_price: Price::new(dec!(24500)),
            fill_source: FillSource::Fallback,
            settings: &s,
        };
        let levels =
            compute_levels(Direction::Sell, source.entry_price, signal.atr, &s, dec!(0.05))
                .unwrap();
        let bracket = build_bracket(&source, &levels, Utc::now());

        assert_eq!(bracket.exit_direction, Direction::Buy);
        assert_eq!(bracket.stop_loss.quantity, 100);
        assert_eq!(bracket.target.quantity, 100);
        assert_eq!(bracket.stop_loss.trigger_price, Price::new(dec!(24650)));
        assert_eq!(bracket.target.trigger_price, Price::new(dec!(24300)));
        assert_eq!(bracket.status, BracketStatus::Active);
        assert_eq!(bracket.metadata.fill_source, FillSource::Fallback);
        assert_eq!(bracket.instrument_token, 42);
    }
}

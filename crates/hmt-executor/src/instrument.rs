//! Futures contract selection (roll rule).
//!
//! Up to and including the 15th of the month the nearest expiry is traded;
//! from the 16th the next-month contract is used, ahead of the nearest one's
//! expiry week.

use chrono::{DateTime, Utc};
use hmt_core::{Instrument, TradingWindow};
use hmt_store::Store;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// Last day of month on which the nearest contract is selected.
pub const ROLL_CUTOFF_DAY: u32 = 15;

/// Contracts fetched from the catalog: nearest and next.
const CONTRACT_LOOKAHEAD: usize = 2;

/// Pick from contracts sorted by ascending expiry.
pub fn select_contract(contracts: Vec<Instrument>, day_of_month: u32) -> Option<Instrument> {
    let index = if day_of_month <= ROLL_CUTOFF_DAY { 0 } else { 1 };
    contracts.into_iter().nth(index)
}

/// Resolve the futures contract to trade for `underlying` at `now`.
///
/// Both the expiry floor and the day of month are taken in the trading
/// window's timezone.
pub async fn resolve_contract(
    store: &dyn Store,
    underlying: &str,
    window: &TradingWindow,
    now: DateTime<Utc>,
) -> GatewayResult<Instrument> {
    let today = window.trading_date(now);
    let day = window.day_of_month(now);
    let contracts = store
        .futures_contracts(underlying, today, CONTRACT_LOOKAHEAD)
        .await?;
    let available = contracts.len();

    let selected = select_contract(contracts, day).ok_or_else(|| {
        let which = if day <= ROLL_CUTOFF_DAY { "current" } else { "next-month" };
        GatewayError::InstrumentNotFound(format!(
            "no {which} futures contract for {underlying} (day {day}, {available} available)"
        ))
    })?;

    debug!(
        underlying,
        tradingsymbol = %selected.tradingsymbol,
        expiry = %selected.expiry,
        day,
        "Resolved futures contract"
    );
    Ok(selected)
}

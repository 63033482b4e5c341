//! Tradable derivative contracts from the reference instrument catalog.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Instrument type for futures contracts in the catalog.
pub const FUTURES_INSTRUMENT_TYPE: &str = "FUT";

/// A catalog row for one derivative contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub instrument_token: i64,
    /// Exchange trading symbol, e.g. "NIFTY26MARFUT".
    pub tradingsymbol: String,
    /// Underlying cash symbol, e.g. "NIFTY".
    pub name: String,
    /// Derivatives exchange, e.g. "NFO".
    pub exchange: String,
    /// "FUT", "CE", "PE".
    pub instrument_type: String,
    pub expiry: NaiveDate,
    pub lot_size: u32,
    #[serde(default = "default_tick_size")]
    pub tick_size: Decimal,
}

fn default_tick_size() -> Decimal {
    Decimal::new(5, 2)
}

impl Instrument {
    /// Broker quote key, e.g. "NFO:NIFTY26MARFUT".
    pub fn quote_key(&self) -> String {
        format!("{}:{}", self.exchange, self.tradingsymbol)
    }

    pub fn is_future(&self) -> bool {
        self.instrument_type == FUTURES_INSTRUMENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_tick_size() {
        let json = serde_json::json!({
            "instrument_token": 13238786,
            "tradingsymbol": "NIFTY26MARFUT",
            "name": "NIFTY",
            "exchange": "NFO",
            "instrument_type": "FUT",
            "expiry": "2026-03-26",
            "lot_size": 50
        });
        let inst: Instrument = serde_json::from_value(json).unwrap();
        assert_eq!(inst.tick_size, dec!(0.05));
        assert_eq!(inst.quote_key(), "NFO:NIFTY26MARFUT");
        assert!(inst.is_future());
    }
}

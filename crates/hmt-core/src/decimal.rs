//! Precision-safe decimal price type.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so bracket levels
//! derived from fills and ATR never pick up floating-point noise.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` so prices cannot be mixed up with ATR values or
/// multipliers in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to the nearest multiple of `tick_size`.
    ///
    /// Midpoints round away from zero. A zero tick leaves the price as is.
    #[inline]
    pub fn round_to_tick(&self, tick_size: Decimal) -> Self {
        if tick_size.is_zero() {
            return *self;
        }
        let ticks = (self.0 / tick_size)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        Self((ticks * tick_size).normalize())
    }

    /// Integer price bucket used for duplicate-signal fingerprints.
    ///
    /// 24500.4 and 24499.6 share bucket 24500.
    #[inline]
    pub fn bucket(&self) -> i64 {
        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add<Decimal> for Price {
    type Output = Self;

    fn add(self, rhs: Decimal) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Decimal> for Price {
    type Output = Self;

    fn sub(self, rhs: Decimal) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_round_to_tick() {
        let tick = dec!(0.05);
        assert_eq!(Price::new(dec!(24360.03)).round_to_tick(tick).0, dec!(24360.05));
        assert_eq!(Price::new(dec!(24360.02)).round_to_tick(tick).0, dec!(24360));
        assert_eq!(Price::new(dec!(101.125)).round_to_tick(tick).0, dec!(101.15));
    }

    #[test]
    fn test_price_round_zero_tick_is_identity() {
        let price = Price::new(dec!(123.456));
        assert_eq!(price.round_to_tick(Decimal::ZERO), price);
    }

    #[test]
    fn test_price_bucket() {
        assert_eq!(Price::new(dec!(24500)).bucket(), 24500);
        assert_eq!(Price::new(dec!(24500.4)).bucket(), 24500);
        assert_eq!(Price::new(dec!(24499.6)).bucket(), 24500);
        assert_eq!(Price::new(dec!(24500.5)).bucket(), 24501);
    }

    #[test]
    fn test_price_arithmetic() {
        let p = Price::new(dec!(24510));
        assert_eq!((p - dec!(150)).0, dec!(24360));
        assert_eq!((p + dec!(200)).0, dec!(24710));
        assert_eq!((p * dec!(2)).0, dec!(49020));
        assert!(p.is_positive());
        assert!(!Price::ZERO.is_positive());
    }
}

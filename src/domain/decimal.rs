//! Money-safe decimal type backed by rust_decimal.
//!
//! Currency amounts are rounded half away from zero at two places.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Number of fractional digits kept for currency amounts.
pub const CURRENCY_SCALE: u32 = 2;

/// Decimal numeric type for money and rates.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON number (not a string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a plain decimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Convert a float, returning `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        RustDecimal::from_f64(value).map(Decimal)
    }

    /// Format without exponent notation or trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Round to currency precision, half away from zero.
    pub fn round_currency(&self) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Clamp into `[lo, hi]`.
    pub fn clamp_to(self, lo: Decimal, hi: Decimal) -> Self {
        if self < lo {
            lo
        } else if self > hi {
            hi
        } else {
            self
        }
    }

    /// Lossy conversion for display-only math such as percentages.
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// `self / denominator * 100`, or zero when the denominator is zero.
    pub fn percent_of(&self, denominator: Decimal) -> Decimal {
        if denominator.is_zero() {
            return Decimal::zero();
        }
        let ratio = self
            .0
            .checked_div(denominator.0)
            .map(Decimal)
            .unwrap_or_else(|| saturate(self.0.is_sign_negative() != denominator.0.is_sign_negative()));
        (ratio * Decimal::hundred()).round_currency()
    }
}

/// Largest magnitude representable, with the given sign.
fn saturate(negative: bool) -> Decimal {
    if negative {
        Decimal(RustDecimal::MIN)
    } else {
        Decimal(RustDecimal::MAX)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl From<usize> for Decimal {
    fn from(value: usize) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

// Arithmetic saturates at the representable range instead of panicking.

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        self.0
            .checked_add(rhs.0)
            .map(Decimal)
            .unwrap_or_else(|| saturate(self.0.is_sign_negative()))
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        self.0
            .checked_sub(rhs.0)
            .map(Decimal)
            .unwrap_or_else(|| saturate(self.0.is_sign_negative()))
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        self.0
            .checked_mul(rhs.0)
            .map(Decimal)
            .unwrap_or_else(|| saturate(self.0.is_sign_negative() != rhs.0.is_sign_negative()))
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_round_currency_half_away_from_zero() {
        assert_eq!(d("2.345").round_currency(), d("2.35"));
        assert_eq!(d("2.344").round_currency(), d("2.34"));
        assert_eq!(d("-2.345").round_currency(), d("-2.35"));
        assert_eq!(d("0.005").round_currency(), d("0.01"));
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        assert!(Decimal::from_f64(f64::NAN).is_none());
        assert!(Decimal::from_f64(f64::INFINITY).is_none());
        assert_eq!(Decimal::from_f64(0.1).unwrap().round_currency(), d("0.1"));
    }

    #[test]
    fn test_percent_of_zero_denominator() {
        assert_eq!(d("5").percent_of(Decimal::zero()), Decimal::zero());
        assert_eq!(d("1").percent_of(d("4")), d("25"));
        assert_eq!(d("1").percent_of(d("3")), d("33.33"));
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(d("1.5").clamp_to(Decimal::zero(), Decimal::one()), Decimal::one());
        assert_eq!(d("-1").clamp_to(Decimal::zero(), Decimal::one()), Decimal::zero());
        assert_eq!(d("0.2").clamp_to(Decimal::zero(), Decimal::one()), d("0.2"));
    }

    #[test]
    fn test_sum() {
        let total: Decimal = vec![d("1.10"), d("2.20"), d("3.30")].into_iter().sum();
        assert_eq!(total, d("6.6"));
    }

    #[test]
    fn test_arithmetic_saturates_instead_of_panicking() {
        let max = Decimal::new(RustDecimal::MAX);
        assert_eq!(max + max, max);
        assert_eq!(max * d("2"), max);
        assert_eq!(max * d("-2"), Decimal::new(RustDecimal::MIN));
        assert_eq!(Decimal::new(RustDecimal::MIN) - max, Decimal::new(RustDecimal::MIN));
        let mut acc = max;
        acc += d("1");
        assert_eq!(acc, max);
        assert_eq!(max.percent_of(d("0.0000001")), max);
    }

    #[test]
    fn test_decimal_json_serialization() {
        let json = serde_json::to_value(d("123.45")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.45");
    }

    #[test]
    fn test_canonical_string_strips_trailing_zeros() {
        assert_eq!(d("110.00").to_canonical_string(), "110");
        assert_eq!(d("1234.50").to_string(), "1234.5");
    }
}

//! Commission, payout and display math.
//!
//! Nothing here fails: malformed input clamps to zero.

use crate::domain::{Booking, Decimal};
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Platform commission applied when a booking carries no usable rate (10%).
pub fn default_commission_rate() -> Decimal {
    Decimal::new(RustDecimal::new(10, 2))
}

/// Monetary fields derived from a base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionBreakdown {
    pub base_price: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub total_price: Decimal,
    pub provider_share: Decimal,
}

/// Totals over a set of bookings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    /// Platform commission collected.
    pub admin_total: Decimal,
    /// Owed to providers.
    pub provider_total: Decimal,
    /// Gross amount charged to customers.
    pub total_volume: Decimal,
}

impl std::ops::Add for BookingSummary {
    type Output = BookingSummary;

    fn add(self, rhs: BookingSummary) -> BookingSummary {
        BookingSummary {
            admin_total: self.admin_total + rhs.admin_total,
            provider_total: self.provider_total + rhs.provider_total,
            total_volume: self.total_volume + rhs.total_volume,
        }
    }
}

fn non_negative(value: Decimal) -> Decimal {
    if value.is_negative() {
        Decimal::zero()
    } else {
        value
    }
}

/// Parse a price typed by a human: strips everything except digits, `.` and
/// `-`, and returns zero for unparsable or negative results.
pub fn parse_price_str(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return Decimal::zero();
    }
    Decimal::from_str_canonical(&cleaned)
        .map(non_negative)
        .unwrap_or_default()
}

/// Parse a string-or-number price from a raw document field.
pub fn parse_price(raw: &Value) -> Decimal {
    match raw {
        Value::String(s) => parse_price_str(s),
        Value::Number(n) => Decimal::from_str_canonical(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64))
            .map(non_negative)
            .unwrap_or_default(),
        _ => Decimal::zero(),
    }
}

/// Rate from a float; `None` for NaN and infinities so callers fall back to
/// the default.
pub fn rate_from_f64(rate: f64) -> Option<Decimal> {
    Decimal::from_f64(rate)
}

/// Split a base price into commission, customer total and provider share.
///
/// Negative prices clamp to zero. A missing rate uses
/// [`default_commission_rate`]; rates outside `[0, 1]` are clamped.
pub fn calculate_commission(base_price: Decimal, rate: Option<Decimal>) -> CommissionBreakdown {
    let base_price = non_negative(base_price);
    let rate = rate
        .unwrap_or_else(default_commission_rate)
        .clamp_to(Decimal::zero(), Decimal::one());

    let commission_amount = (base_price * rate).round_currency();
    CommissionBreakdown {
        base_price,
        commission_rate: rate,
        commission_amount,
        total_price: (base_price + commission_amount).round_currency(),
        provider_share: base_price.round_currency(),
    }
}

/// Fold bookings into admin/provider/volume totals.
///
/// Provider share and volume fall back to the base price when the stored
/// field is missing.
pub fn summarize_bookings<'a, I>(bookings: I) -> BookingSummary
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .map(|b| BookingSummary {
            admin_total: non_negative(b.commission_amount.unwrap_or_default()),
            provider_total: non_negative(b.provider_share.unwrap_or(b.base_price)),
            total_volume: non_negative(b.total_price.unwrap_or(b.base_price)),
        })
        .fold(BookingSummary::default(), |acc, s| acc + s)
}

impl Booking {
    /// Re-derive the stored money fields from `base_price`.
    pub fn with_commission(mut self, rate: Option<Decimal>) -> Self {
        let breakdown = calculate_commission(self.base_price, rate.or(self.commission_rate));
        self.base_price = breakdown.base_price;
        self.commission_rate = Some(breakdown.commission_rate);
        self.commission_amount = Some(breakdown.commission_amount);
        self.total_price = Some(breakdown.total_price);
        self.provider_share = Some(breakdown.provider_share);
        self
    }
}

/// Currency symbol and separators for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub thousands_separator: String,
    pub decimal_separator: String,
    /// Render the symbol after the amount ("1.234,50 €").
    pub symbol_after: bool,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            thousands_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            symbol_after: false,
        }
    }
}

impl CurrencyFormat {
    /// Separators and symbol for a BCP 47 tag; unknown tags use `en-US`.
    pub fn for_locale(tag: &str) -> Self {
        let (symbol, thousands, decimal, after) = match tag.trim().to_lowercase().as_str() {
            "en-gb" => ("£", ",", ".", false),
            "en-in" => ("₹", ",", ".", false),
            "de-de" => ("€", ".", ",", true),
            "fr-fr" => ("€", "\u{202f}", ",", true),
            "es-es" => ("€", ".", ",", true),
            "pt-br" => ("R$", ".", ",", false),
            _ => return Self::default(),
        };
        Self {
            symbol: symbol.to_string(),
            thousands_separator: thousands.to_string(),
            decimal_separator: decimal.to_string(),
            symbol_after: after,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    /// Format with exactly two decimals and grouped thousands.
    pub fn format(&self, value: Decimal) -> String {
        let mut rounded = non_negative(value).round_currency().inner();
        rounded.rescale(2);
        let plain = rounded.to_string();
        let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

        let digits: Vec<char> = int_part.chars().collect();
        let mut grouped = String::new();
        for (i, c) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push_str(&self.thousands_separator);
            }
            grouped.push(*c);
        }

        let amount = format!("{}{}{}", grouped, self.decimal_separator, frac_part);
        if self.symbol_after {
            format!("{} {}", amount, self.symbol)
        } else {
            format!("{}{}", self.symbol, amount)
        }
    }
}

pub fn format_currency(value: Decimal, format: &CurrencyFormat) -> String {
    format.format(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_parse_price_strings() {
        assert_eq!(parse_price_str("$1,234.50"), d("1234.5"));
        assert_eq!(parse_price_str("abc"), Decimal::zero());
        assert_eq!(parse_price_str(""), Decimal::zero());
        assert_eq!(parse_price_str("-50"), Decimal::zero());
        assert_eq!(parse_price_str("1.2.3"), Decimal::zero());
        assert_eq!(parse_price_str("USD 99"), d("99"));
    }

    #[test]
    fn test_parse_price_values() {
        assert_eq!(parse_price(&json!(42.5)), d("42.5"));
        assert_eq!(parse_price(&json!(100)), d("100"));
        assert_eq!(parse_price(&json!(-3)), Decimal::zero());
        assert_eq!(parse_price(&json!(null)), Decimal::zero());
        assert_eq!(parse_price(&json!({"amount": 3})), Decimal::zero());
    }

    #[test]
    fn test_default_rate_is_ten_percent() {
        assert_eq!(default_commission_rate(), d("0.1"));
        let b = calculate_commission(d("200"), None);
        assert_eq!(b.commission_amount, d("20"));
        assert_eq!(b.total_price, d("220"));
    }

    #[test]
    fn test_rate_from_non_finite_falls_back() {
        let b = calculate_commission(d("50"), rate_from_f64(f64::NAN));
        assert_eq!(b.commission_rate, d("0.1"));
    }

    #[test]
    fn test_out_of_range_rate_is_clamped() {
        assert_eq!(calculate_commission(d("10"), Some(d("1.5"))).commission_amount, d("10"));
        assert_eq!(calculate_commission(d("10"), Some(d("-0.2"))).commission_amount, Decimal::zero());
    }

    #[test]
    fn test_commission_rounds_half_away_from_zero() {
        let b = calculate_commission(d("0.25"), Some(d("0.1")));
        assert_eq!(b.commission_amount, d("0.03"));
        assert_eq!(b.total_price, d("0.28"));
    }

    #[test]
    fn test_with_commission_fills_booking() {
        let booking = Booking::new("b1", "Cleaning", d("80")).with_commission(Some(d("0.15")));
        assert_eq!(booking.commission_amount, Some(d("12")));
        assert_eq!(booking.total_price, Some(d("92")));
        assert_eq!(booking.provider_share, Some(d("80")));
        assert_eq!(booking.commission_rate, Some(d("0.15")));
    }

    #[test]
    fn test_format_currency_default() {
        let f = CurrencyFormat::default();
        assert_eq!(f.format(d("1234567.891")), "$1,234,567.89");
        assert_eq!(f.format(d("0")), "$0.00");
        assert_eq!(f.format(d("999.5")), "$999.50");
        assert_eq!(f.format(d("-10")), "$0.00");
    }

    #[test]
    fn test_format_currency_locales() {
        assert_eq!(CurrencyFormat::for_locale("de-DE").format(d("1234.5")), "1.234,50 €");
        assert_eq!(CurrencyFormat::for_locale("en-GB").format(d("12")), "£12.00");
        assert_eq!(CurrencyFormat::for_locale("xx-YY"), CurrencyFormat::default());
        assert_eq!(
            CurrencyFormat::default().with_symbol("KSh ").format(d("1000")),
            "KSh 1,000.00"
        );
    }
}

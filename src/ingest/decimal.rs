//! Exact decimal parsing for spreadsheet cells.
//!
//! Spreadsheet amounts arrive as free text such as `"$5,000.00"` or
//! `" 300.50 "`. This module reduces them to an exact [`Decimal`] and
//! bounds stored money to [`MONEY_MAX_DIGITS`] digits with
//! [`MONEY_DECIMAL_PLACES`] decimal places.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for every stored amount.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Total digits allowed in a stored amount.
pub const MONEY_MAX_DIGITS: u32 = 10;

/// Why an amount cannot be stored as money.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyError {
    /// More than [`MONEY_MAX_DIGITS`] digits.
    TooManyDigits,
    /// More than [`MONEY_DECIMAL_PLACES`] digits after the point.
    TooManyDecimalPlaces,
    /// More than `MONEY_MAX_DIGITS - MONEY_DECIMAL_PLACES` digits before the
    /// point.
    TooManyWholeDigits,
}

impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyError::TooManyDigits => write!(
                f,
                "Ensure that there are no more than {} digits in total.",
                MONEY_MAX_DIGITS
            ),
            MoneyError::TooManyDecimalPlaces => write!(
                f,
                "Ensure that there are no more than {} decimal places.",
                MONEY_DECIMAL_PLACES
            ),
            MoneyError::TooManyWholeDigits => write!(
                f,
                "Ensure that there are no more than {} digits before the decimal point.",
                MONEY_MAX_DIGITS - MONEY_DECIMAL_PLACES
            ),
        }
    }
}

fn digit_count(value: Decimal) -> u32 {
    let mantissa = value.mantissa().unsigned_abs();
    if mantissa == 0 { 1 } else { mantissa.ilog10() + 1 }
}

/// Checks an amount exactly as entered and returns it at two decimal places.
///
/// Trailing zeros count, so `"1.000"` has three decimal places.
///
/// # Examples
///
/// ```
/// use payroll_engine::ingest::{validate_money, MoneyError};
/// use rust_decimal::Decimal;
///
/// assert_eq!(validate_money(Decimal::new(15, 0)).unwrap().to_string(), "15.00");
/// assert_eq!(validate_money(Decimal::new(5, 3)), Err(MoneyError::TooManyDecimalPlaces));
/// ```
pub fn validate_money(value: Decimal) -> Result<Decimal, MoneyError> {
    let decimal_places = value.scale();
    let total_digits = digit_count(value).max(decimal_places);
    let whole_digits = total_digits - decimal_places;

    if total_digits > MONEY_MAX_DIGITS {
        return Err(MoneyError::TooManyDigits);
    }
    if decimal_places > MONEY_DECIMAL_PLACES {
        return Err(MoneyError::TooManyDecimalPlaces);
    }
    if whole_digits > MONEY_MAX_DIGITS - MONEY_DECIMAL_PLACES {
        return Err(MoneyError::TooManyWholeDigits);
    }

    let mut money = value;
    money.rescale(MONEY_DECIMAL_PLACES);
    Ok(money)
}

/// Rounds a parsed cell to two decimal places, half to even.
///
/// Returns `None` if the rounded value still does not fit in
/// [`MONEY_MAX_DIGITS`] digits.
///
/// # Examples
///
/// ```
/// use payroll_engine::ingest::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(5, 3)).unwrap().to_string(), "0.00");
/// assert_eq!(round_money(Decimal::new(15, 3)).unwrap().to_string(), "0.02");
/// assert_eq!(round_money(Decimal::new(100_000_000, 0)), None);
/// ```
pub fn round_money(value: Decimal) -> Option<Decimal> {
    let mut money =
        value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven);
    money.rescale(MONEY_DECIMAL_PLACES);
    validate_money(money).ok()
}

/// Parses cell text into an exact decimal.
///
/// Every character other than an ASCII digit, `.` or `-` is removed before
/// parsing. Returns `None` when nothing is left or the remainder is not a
/// valid decimal, so callers can tell a missing value from zero.
///
/// # Examples
///
/// ```
/// use payroll_engine::ingest::parse_decimal;
/// use rust_decimal::Decimal;
///
/// assert_eq!(parse_decimal("$5,000.00"), Some(Decimal::new(500000, 2)));
/// assert_eq!(parse_decimal("-50.25"), Some(Decimal::new(-5025, 2)));
/// assert_eq!(parse_decimal("N/A"), None);
/// assert_eq!(parse_decimal("0"), Some(Decimal::ZERO));
/// ```
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    Decimal::from_str(&cleaned).ok()
}

/// Parses an optional cell, treating an absent cell as unparseable.
pub fn parse_optional_decimal(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(parse_decimal)
}

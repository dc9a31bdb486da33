//! Money helpers with decimal precision and currency codes.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` values limited to two fractional
//! digits (minor units). Nothing here rounds: an amount that does not fit is
//! rejected so that the caller sees the problem.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits an amount may carry.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Largest amount the ledger stores, matching a `NUMERIC(19, 2)` column.
#[must_use]
pub fn max_amount() -> Decimal {
    Decimal::from_i128_with_scale(9_999_999_999_999_999_999, MINOR_UNIT_SCALE)
}

/// Errors raised when an amount or currency fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Amount is zero or negative.
    #[error("Amount must be greater than zero, got {0}")]
    NotPositive(Decimal),

    /// Amount has more fractional digits than minor units allow.
    #[error("Amount {0} has more than 2 decimal places")]
    TooPrecise(Decimal),

    /// Amount is larger than the ledger can store.
    #[error("Amount {0} exceeds the maximum of 99999999999999999.99")]
    TooLarge(Decimal),

    /// Currency code is not three ASCII letters.
    #[error("Invalid currency code: {0:?}")]
    InvalidCurrency(String),
}

/// Validates a positive amount and normalises it to minor-unit scale.
///
/// `400` becomes `400.00`; `400.001` is rejected.
///
/// # Errors
///
/// Returns `MoneyError::NotPositive`, `MoneyError::TooPrecise` or
/// `MoneyError::TooLarge`.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive(amount));
    }
    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(MoneyError::TooPrecise(amount));
    }
    if amount > max_amount() {
        return Err(MoneyError::TooLarge(amount));
    }
    let mut scaled = amount;
    scaled.rescale(MINOR_UNIT_SCALE);
    Ok(scaled)
}

/// Formats an amount with exactly two decimals for display and the wire.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let mut scaled = amount;
    scaled.rescale(MINOR_UNIT_SCALE);
    scaled.to_string()
}

/// ISO-4217-style currency code, always three upper-case ASCII letters.
///
/// The ledger stores and compares codes; it never converts between them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// US dollars, the fallback when configuration names no currency.
    #[must_use]
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(MoneyError::InvalidCurrency(s.to_string()))
        }
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "money_tests.rs"]
mod tests;

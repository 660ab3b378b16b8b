//! Rupee amounts held as integer paise

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const PAISE_PER_RUPEE: u64 = 100;

/// An amount of money in paise (1 rupee = 100 paise)
///
/// Serialized as a bare integer so documents never carry floats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,
    #[error("amount `{0}` is not a decimal number")]
    Invalid(String),
    #[error("amount `{0}` has more than two decimal places")]
    TooPrecise(String),
    #[error("amount `{0}` is too large")]
    Overflow(String),
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_paise(paise: u64) -> Self {
        Money(paise)
    }

    pub const fn from_rupees(rupees: u64) -> Self {
        Money(rupees.saturating_mul(PAISE_PER_RUPEE))
    }

    pub const fn paise(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Plain decimal form used on the wire, e.g. `"50.00"`
    pub fn to_decimal_string(self) -> String {
        format!("{}.{:02}", self.0 / PAISE_PER_RUPEE, self.0 % PAISE_PER_RUPEE)
    }

    /// Parse a decimal rupee amount such as `"50"`, `"50.5"` or `"50.00"`
    pub fn parse_decimal(input: &str) -> Result<Money, MoneyParseError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('₹').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (trimmed, None),
        };

        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || fraction.is_some_and(|f| !all_digits(f)) {
            return Err(MoneyParseError::Invalid(input.to_string()));
        }

        let rupees: u64 = whole
            .parse()
            .map_err(|_| MoneyParseError::Overflow(input.to_string()))?;

        let paise = match fraction {
            None => 0,
            Some(f) if f.len() > 2 => return Err(MoneyParseError::TooPrecise(input.to_string())),
            Some(f) if f.len() == 1 => f.parse::<u64>().unwrap_or(0) * 10,
            Some(f) => f.parse::<u64>().unwrap_or(0),
        };

        rupees
            .checked_mul(PAISE_PER_RUPEE)
            .and_then(|p| p.checked_add(paise))
            .map(Money)
            .ok_or_else(|| MoneyParseError::Overflow(input.to_string()))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{}", self.to_decimal_string())
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse_decimal(s)
    }
}

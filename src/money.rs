//! Money Types
//!
//! Monetary values are parsed once at the boundary and carried internally as
//! [`Decimal`]. Nothing below the HTTP layer sees a string amount.
//!
//! - [`Amount`]: strictly positive transfer amount
//! - [`Balance`]: non-negative account balance
//!
//! ## Format rules
//! - `"0.5"` is accepted, `".5"` and `"5."` are rejected
//! - A leading `+` is rejected
//! - At most [`MONEY_SCALE`] fractional digits and [`MAX_INTEGER_DIGITS`]
//!   integer digits (matches `NUMERIC(20,4)`)

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fractional digits stored by the balance table
pub const MONEY_SCALE: u32 = 4;

/// Integer digits stored by the balance table (20 - 4)
pub const MAX_INTEGER_DIGITS: u32 = 16;

/// 10^16, the smallest magnitude the balance table cannot hold
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(0x6FC1_0000, 0x0023_86F2, 0, false, 0);

/// Whether `value` fits `NUMERIC(20,4)` by magnitude
#[inline]
pub fn within_limit(value: Decimal) -> bool {
    value.abs() < MONEY_LIMIT
}

/// Money parsing and validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be greater than zero")]
    NonPositive,

    #[error("Balance cannot be negative")]
    Negative,

    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Out of range: at most {max_digits} integer digits allowed")]
    OutOfRange { max_digits: u32 },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Parse a client-supplied decimal string with strict format checks.
///
/// Sign is not validated here; [`Amount`] and [`Balance`] apply their own rules.
pub fn parse_decimal(raw: &str) -> Result<Decimal, MoneyError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if s.starts_with('+') {
        return Err(MoneyError::InvalidFormat("explicit '+' sign".into()));
    }
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    if unsigned.starts_with('.') {
        return Err(MoneyError::InvalidFormat(
            "missing leading zero (e.g., use 0.5 instead of .5)".into(),
        ));
    }
    if unsigned.ends_with('.') {
        return Err(MoneyError::InvalidFormat(
            "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
        ));
    }

    let value = Decimal::from_str(s).map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;
    check_bounds(value)
}

fn check_bounds(value: Decimal) -> Result<Decimal, MoneyError> {
    // Trailing zeros ("1.50000") do not count against the limit
    let provided = value.normalize().scale();
    if provided > MONEY_SCALE {
        return Err(MoneyError::PrecisionOverflow {
            provided,
            max: MONEY_SCALE,
        });
    }
    if !within_limit(value) {
        return Err(MoneyError::OutOfRange {
            max_digits: MAX_INTEGER_DIGITS,
        });
    }
    Ok(value)
}

/// Strict serde helper: accepts a JSON string or a JSON number.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DecimalOrString {
        String(String),
        Number(Decimal),
    }

    match DecimalOrString::deserialize(deserializer)? {
        DecimalOrString::String(s) => parse_decimal(&s).map_err(D::Error::custom),
        DecimalOrString::Number(d) => check_bounds(d).map_err(D::Error::custom),
    }
}

/// Transfer amount, always > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        let value = check_bounds(value)?;
        if value <= Decimal::ZERO {
            return Err(MoneyError::NonPositive);
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_decimal(s)?)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MoneyError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // String keeps precision across JSON clients
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = deserialize_decimal(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

/// Account balance, always >= 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Balance = Balance(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        let value = check_bounds(value)?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Balance {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(parse_decimal(s)?)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = deserialize_decimal(deserializer)?;
        Balance::new(value).map_err(serde::de::Error::custom)
    }
}

//! Amount type for handling non-negative monetary values.
//!
//! The expense service sends amounts as JSON numbers, while people type them with or without a
//! dollar sign and thousands separators. `Amount` accepts all of these and keeps a `Decimal`
//! internally so that totals are exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// Represents a dollar amount. Amounts are never negative.
///
/// # Examples
///
/// ```
/// # use expense_sync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("$1,250.5").unwrap();
/// assert_eq!(amount.to_string(), "$1,250.50");
/// assert!(Amount::from_str("-3").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Creates an `Amount`, failing if `value` is negative.
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value.is_zero() {
            return Ok(Self(Decimal::ZERO));
        }
        if value.is_sign_negative() {
            return Err(AmountError::Negative(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

/// An error that can occur when turning user or backend input into an `Amount`.
#[derive(Debug, thiserror::Error)]
pub enum AmountError {
    #[error("'{0}' is not a valid amount")]
    Parse(String, #[source] rust_decimal::Error),

    #[error("Amounts cannot be negative, got {0}")]
    Negative(Decimal),
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let without_dollar = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let without_commas = without_dollar.replace(',', "");
        let value = Decimal::from_str(&without_commas)
            .map_err(|e| AmountError::Parse(s.to_string(), e))?;
        Amount::new(value)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}",
            format_num::format_num!(",.2", self.0.to_f64().unwrap_or_default())
        )
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // The service stores amounts as JSON numbers
        serializer.serialize_f64(self.0.to_f64().unwrap_or_default())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative number or numeric string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Amount(Decimal::from(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Amount::new(Decimal::from(v)).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // Going through the shortest string form keeps 12.1 as 12.1 rather than its binary
        // expansion
        Amount::from_str(&v.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Amount::from_str(v).map_err(E::custom)
    }
}

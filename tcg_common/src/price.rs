//! Non-negative prices with two decimal places.
//!
//! Prices are kept as integer cents so that merges and comparisons are exact.
//! On the wire they are plain JSON numbers (`1.5`), but strings such as
//! `"1.50"` or `"1,50"` are accepted when reading hand-edited documents.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PriceError {
    #[error("price is negative: {0}")]
    Negative(String),
    #[error("price is not a number: {0}")]
    NotANumber(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price {
    cents: u64,
}

impl Price {
    pub const ZERO: Price = Price { cents: 0 };

    pub fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }

    /// Convert a decimal amount, rounding to the nearest cent
    pub fn from_f64(value: f64) -> Result<Self, PriceError> {
        if !value.is_finite() {
            return Err(PriceError::NotANumber(value.to_string()));
        }
        if value < 0.0 {
            return Err(PriceError::Negative(value.to_string()));
        }
        Ok(Self {
            cents: (value * 100.0).round() as u64,
        })
    }

    pub fn as_f64(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Parse a price string; accepts a comma as decimal separator and an
    /// optional leading currency symbol.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let cleaned = s
            .trim()
            .trim_start_matches(['$', '€', '£'])
            .trim()
            .replace(',', ".");
        let value: f64 = cleaned
            .parse()
            .map_err(|_| PriceError::NotANumber(s.to_string()))?;
        Self::from_f64(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Price::from_f64(n).map_err(de::Error::custom),
            Raw::Text(s) => Price::parse(&s).map_err(de::Error::custom),
        }
    }
}

//! Currency pairs and daily closing rates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A currency pair quoted as units of `quote` per one unit of `base`.
///
/// Displayed as the six-letter code (`USDEUR`), which is also the stored form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    #[error("invalid currency code '{0}' (expected three ASCII letters)")]
    InvalidCode(String),

    #[error("invalid currency pair '{0}' (expected six letters, e.g. USDEUR)")]
    InvalidPair(String),
}

impl CurrencyPair {
    pub fn new(base: &str, quote: &str) -> Result<Self, PairError> {
        Ok(Self {
            base: normalize_code(base)?,
            quote: normalize_code(quote)?,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Yahoo Finance ticker for this pair, e.g. `USDEUR=X`.
    pub fn yahoo_ticker(&self) -> String {
        format!("{}{}=X", self.base, self.quote)
    }
}

/// Validate and upper-case a three-letter ISO code.
pub fn normalize_code(code: &str) -> Result<String, PairError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(PairError::InvalidCode(code.to_string()))
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.is_ascii() {
            return Err(PairError::InvalidPair(s.to_string()));
        }
        let (base, quote) = s.split_at(3);
        Self::new(base, quote).map_err(|_| PairError::InvalidPair(s.to_string()))
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = PairError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

/// Daily close of one currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRecord {
    pub date: NaiveDate,
    pub pair: CurrencyPair,
    pub close: f64,
}

/// Primary key of a [`CurrencyRecord`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyKey {
    pub date: NaiveDate,
    pub pair: CurrencyPair,
}

impl CurrencyRecord {
    pub fn new(date: NaiveDate, pair: CurrencyPair, close: f64) -> Self {
        Self { date, pair, close }
    }

    pub fn key(&self) -> CurrencyKey {
        CurrencyKey {
            date: self.date,
            pair: self.pair.clone(),
        }
    }
}

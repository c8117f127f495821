//! Data provider traits and structured error types.
//!
//! The two traits abstract over the external sources (Yahoo Finance rates,
//! GDELT event counts) so we can swap implementations and mock for tests.
//! Providers never touch the stores; the fetch orchestrator sits above them.

use crate::domain::{CurrencyPair, CurrencyRecord, EventRecord};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and log lines.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider refused requests (HTTP 403)")]
    Blocked,

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no event file published for {date}")]
    NotPublished { date: NaiveDate },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True when continuing to call the same provider in this run is pointless.
    pub fn aborts_source(&self) -> bool {
        matches!(
            self,
            DataError::RateLimited { .. } | DataError::Blocked | DataError::NetworkUnreachable(_)
        )
    }
}

/// Source of daily currency closes.
pub trait RateProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily closes for one pair over an inclusive date range.
    ///
    /// An empty vector is a valid answer (weekend-only range, market holiday).
    fn fetch_rates(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CurrencyRecord>, DataError>;
}

/// Source of daily event counts.
pub trait EventProvider {
    fn name(&self) -> &str;

    /// Fetch all event counts for one calendar day.
    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EventRecord>, DataError>;
}

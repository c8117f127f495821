//! Yahoo Finance rate provider.
//!
//! Fetches daily closes for `USD{CUR}=X` tickers from Yahoo's v8 chart API.
//! One request per pair and no backoff loop: a failed pair is picked up again
//! by the next scheduled run, which resumes from that pair's own watermark.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DataError, RateProvider};
use crate::domain::{CurrencyPair, CurrencyRecord};
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Yahoo Finance rate provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
}

impl YahooProvider {
    pub fn new() -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Build the chart API URL for a ticker and date range.
    fn chart_url(ticker: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive; ask for everything up to the end of `end`
        let end_ts = (end + chrono::Duration::days(1))
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{ticker}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    /// Parse the chart API response into currency records.
    fn parse_response(
        pair: &CurrencyPair,
        resp: ChartResponse,
    ) -> Result<Vec<CurrencyRecord>, DataError> {
        let result = resp.chart.result.ok_or_else(|| {
            if let Some(err) = resp.chart.error {
                if err.code == "Not Found" {
                    DataError::SymbolNotFound {
                        symbol: pair.yahoo_ticker(),
                    }
                } else {
                    DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
                }
            } else {
                DataError::ResponseFormatChanged("empty result with no error".into())
            }
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // No timestamps means no trading days in the requested range
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let offset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut records: Vec<CurrencyRecord> = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            // Exchange-local calendar date
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            if !close.is_finite() || close <= 0.0 {
                continue;
            }

            // The live session can repeat the last date; keep the latest quote
            match records.last_mut() {
                Some(last) if last.date == date => last.close = close,
                _ => records.push(CurrencyRecord::new(date, pair.clone(), close)),
            }
        }

        Ok(records)
    }
}

impl RateProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_rates(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CurrencyRecord>, DataError> {
        let ticker = pair.yahoo_ticker();
        let url = Self::chart_url(&ticker, start, end);

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::Blocked);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound { symbol: ticker });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {ticker}")));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {ticker}: {e}"))
        })?;

        let records = Self::parse_response(pair, chart)?;
        Ok(records
            .into_iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect())
    }
}

//! Polars conversions for the stored record kinds.
//!
//! Event schema: `date: Date, event_type: String, country: String, count: UInt64`.
//! Currency schema: `date: Date, currency_pair: String, close: Float64`.

use super::provider::DataError;
use super::store::StoreRecord;
use crate::domain::{CurrencyKey, CurrencyPair, CurrencyRecord, EventKey, EventRecord};
use chrono::NaiveDate;
use polars::prelude::*;

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn date_column(dates: impl Iterator<Item = NaiveDate>) -> Result<Column, DataError> {
    let days: Vec<i32> = dates.map(|d| (d - epoch()).num_days() as i32).collect();
    Column::new("date".into(), days)
        .cast(&DataType::Date)
        .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))
}

fn column_err(e: PolarsError) -> DataError {
    DataError::ParquetError(format!("column read: {e}"))
}

fn date_at(days: Option<i32>, row: usize) -> Result<NaiveDate, DataError> {
    let days = days.ok_or_else(|| DataError::ParquetError(format!("null date at row {row}")))?;
    Ok(epoch() + chrono::Duration::days(days as i64))
}

impl StoreRecord for EventRecord {
    type Key = EventKey;

    const STORE_NAME: &'static str = "events";
    const COLUMNS: &'static [&'static str] = &["date", "event_type", "country", "count"];

    fn key(&self) -> EventKey {
        EventRecord::key(self)
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn to_frame(records: &[&Self]) -> Result<DataFrame, DataError> {
        let event_types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
        let countries: Vec<&str> = records.iter().map(|r| r.country.as_str()).collect();
        let counts: Vec<u64> = records.iter().map(|r| r.count).collect();

        DataFrame::new(vec![
            date_column(records.iter().map(|r| r.date))?,
            Column::new("event_type".into(), event_types),
            Column::new("country".into(), countries),
            Column::new("count".into(), counts),
        ])
        .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, DataError> {
        let dates = df.column("date").map_err(column_err)?;
        let event_types = df.column("event_type").map_err(column_err)?;
        let countries = df.column("country").map_err(column_err)?;
        let counts = df.column("count").map_err(column_err)?;

        let date_ca = dates
            .date()
            .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
        let type_ca = event_types
            .str()
            .map_err(|e| DataError::ParquetError(format!("event_type column type: {e}")))?;
        let country_ca = countries
            .str()
            .map_err(|e| DataError::ParquetError(format!("country column type: {e}")))?;
        let count_ca = counts
            .u64()
            .map_err(|e| DataError::ParquetError(format!("count column type: {e}")))?;

        let n = df.height();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let event_type = type_ca
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null event_type at row {i}")))?;
            records.push(EventRecord {
                date: date_at(date_ca.get(i), i)?,
                event_type: event_type.to_string(),
                country: country_ca.get(i).unwrap_or_default().to_string(),
                count: count_ca.get(i).unwrap_or(0),
            });
        }
        Ok(records)
    }
}

impl StoreRecord for CurrencyRecord {
    type Key = CurrencyKey;

    const STORE_NAME: &'static str = "currencies";
    const COLUMNS: &'static [&'static str] = &["date", "currency_pair", "close"];

    fn key(&self) -> CurrencyKey {
        CurrencyRecord::key(self)
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn to_frame(records: &[&Self]) -> Result<DataFrame, DataError> {
        let pairs: Vec<String> = records.iter().map(|r| r.pair.to_string()).collect();
        let closes: Vec<f64> = records.iter().map(|r| r.close).collect();

        DataFrame::new(vec![
            date_column(records.iter().map(|r| r.date))?,
            Column::new("currency_pair".into(), pairs),
            Column::new("close".into(), closes),
        ])
        .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>, DataError> {
        let dates = df.column("date").map_err(column_err)?;
        let pairs = df.column("currency_pair").map_err(column_err)?;
        let closes = df.column("close").map_err(column_err)?;

        let date_ca = dates
            .date()
            .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
        let pair_ca = pairs
            .str()
            .map_err(|e| DataError::ParquetError(format!("currency_pair column type: {e}")))?;
        let close_ca = closes
            .f64()
            .map_err(|e| DataError::ParquetError(format!("close column type: {e}")))?;

        let n = df.height();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let pair: CurrencyPair = pair_ca
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null currency_pair at row {i}")))?
                .parse()
                .map_err(|e| DataError::ValidationError(format!("row {i}: {e}")))?;
            records.push(CurrencyRecord {
                date: date_at(date_ca.get(i), i)?,
                pair,
                close: close_ca.get(i).unwrap_or(f64::NAN),
            });
        }
        Ok(records)
    }
}

//! GDELT event-count provider.
//!
//! Reads the GDELT 1.0 daily GKG counts file
//! (`{base_url}/YYYYMMDD.gkgcounts.csv.zip`): a zipped, tab-separated table with
//! a header row. Every row is one counted mention (COUNTTYPE such as KILL,
//! PROTEST, ARREST) with a location; we tally rows per
//! `(DATE, COUNTTYPE, country)`.

use super::provider::{DataError, EventProvider};
use crate::domain::{country_from_geo, EventRecord};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://data.gdeltproject.org/gkg";

/// Country label for rows without a usable location.
pub const UNKNOWN_COUNTRY: &str = "Unknown";

/// GDELT GKG counts provider.
pub struct GdeltProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl GdeltProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, DataError> {
        // Daily archives run to tens of megabytes
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn day_url(&self, date: NaiveDate) -> String {
        format!("{}/{}.gkgcounts.csv.zip", self.base_url, date.format("%Y%m%d"))
    }

    fn download(&self, date: NaiveDate) -> Result<Vec<u8>, DataError> {
        let url = self.day_url(date);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::NotPublished { date });
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::Blocked);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                retry_after_secs: 60,
            });
        }
        if !status.is_success() {
            return Err(DataError::Other(format!("HTTP {status} for {url}")));
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))
    }
}

impl EventProvider for GdeltProvider {
    fn name(&self) -> &str {
        "gdelt_gkg_counts"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EventRecord>, DataError> {
        let bytes = self.download(date)?;
        let table = unzip_first(&bytes)?;
        let records = parse_counts(table.as_slice(), date)?;
        tracing::debug!(%date, rows = records.len(), "parsed GDELT counts");
        Ok(records)
    }
}

/// Extract the first entry of a zip archive.
pub fn unzip_first(bytes: &[u8]) -> Result<Vec<u8>, DataError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| DataError::Archive(e.to_string()))?;
    if archive.is_empty() {
        return Err(DataError::Archive("archive has no entries".into()));
    }
    let mut entry = archive
        .by_index(0)
        .map_err(|e| DataError::Archive(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .read_to_end(&mut out)
        .map_err(|e| DataError::Archive(e.to_string()))?;
    Ok(out)
}

/// Tally a GKG counts table into event records.
///
/// Only rows dated `expected` are counted; malformed dates and rows for other
/// days are skipped.
pub fn parse_counts<R: Read>(
    reader: R,
    expected: NaiveDate,
) -> Result<Vec<EventRecord>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| DataError::ResponseFormatChanged(format!("counts header: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("missing column '{name}'")))
    };
    let date_idx = column("DATE")?;
    let type_idx = column("COUNTTYPE")?;
    let geo_idx = column("GEO_FULLNAME")?;

    let mut tally: BTreeMap<(String, String), u64> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in rdr.records() {
        let row = row.map_err(|e| DataError::ResponseFormatChanged(format!("counts row: {e}")))?;

        let date = row
            .get(date_idx)
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y%m%d").ok());
        if date != Some(expected) {
            skipped += 1;
            continue;
        }

        let event_type = row.get(type_idx).map(str::trim).unwrap_or_default();
        if event_type.is_empty() {
            skipped += 1;
            continue;
        }
        let country = row
            .get(geo_idx)
            .and_then(country_from_geo)
            .unwrap_or(UNKNOWN_COUNTRY);

        *tally
            .entry((event_type.to_string(), country.to_string()))
            .or_default() += 1;
    }

    if skipped > 0 {
        tracing::debug!(%expected, skipped, "skipped GDELT rows");
    }

    Ok(tally
        .into_iter()
        .map(|((event_type, country), count)| {
            EventRecord::new(expected, event_type, country, count)
        })
        .collect())
}

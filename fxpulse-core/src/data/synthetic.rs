//! Deterministic synthetic providers for offline runs and tests.
//!
//! Values are clearly fake. Rates are a random walk seeded from the pair name
//! and anchored at a fixed date, so any window of the same pair reproduces the
//! same closes. Event counts are seeded from the date.

use super::provider::{DataError, EventProvider, RateProvider};
use crate::domain::{CurrencyPair, CurrencyRecord, EventRecord};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SYNTHETIC_EVENT_TYPES: &[&str] = &[
    "PROTEST", "KILL", "ARREST", "WOUND", "KIDNAP", "AFFECT", "DISPLACED", "SEIZE",
];

pub const SYNTHETIC_COUNTRIES: &[&str] = &[
    "United States",
    "India",
    "United Kingdom",
    "Japan",
    "Germany",
    "France",
    "China",
    "Brazil",
    "Nigeria",
];

fn seeded(label: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(label.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Random-walk exchange rates, weekdays only.
pub struct SyntheticRates {
    anchor: NaiveDate,
}

impl SyntheticRates {
    pub fn new() -> Self {
        Self {
            anchor: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
        }
    }
}

impl Default for SyntheticRates {
    fn default() -> Self {
        Self::new()
    }
}

impl RateProvider for SyntheticRates {
    fn name(&self) -> &str {
        "synthetic_rates"
    }

    fn fetch_rates(
        &self,
        pair: &CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CurrencyRecord>, DataError> {
        if start > end {
            return Err(DataError::ValidationError(format!(
                "start {start} is after end {end}"
            )));
        }

        let mut rng = seeded(&pair.to_string());
        let mut close: f64 = rng.gen_range(0.5..150.0);
        let mut records = Vec::new();
        let mut day = self.anchor;
        while day <= end {
            if !is_weekend(day) {
                close *= 1.0 + rng.gen_range(-0.01..0.01);
                if day >= start {
                    records.push(CurrencyRecord::new(day, pair.clone(), close));
                }
            }
            day += Duration::days(1);
        }
        Ok(records)
    }
}

/// Random event counts for a fixed set of types and countries.
pub struct SyntheticEvents;

impl EventProvider for SyntheticEvents {
    fn name(&self) -> &str {
        "synthetic_events"
    }

    fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EventRecord>, DataError> {
        let mut rng = seeded(&format!("events:{date}"));
        let mut records = Vec::new();
        for event_type in SYNTHETIC_EVENT_TYPES {
            for country in SYNTHETIC_COUNTRIES {
                // Sparse: not every type is reported for every country daily
                if rng.gen_bool(0.35) {
                    continue;
                }
                let count = rng.gen_range(1..60u64);
                records.push(EventRecord::new(date, *event_type, *country, count));
            }
        }
        Ok(records)
    }
}

//! Event counts — one row per (date, event type, country).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily count of one GDELT event type in one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: NaiveDate,
    pub event_type: String,
    pub country: String,
    pub count: u64,
}

/// Primary key of an [`EventRecord`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub date: NaiveDate,
    pub event_type: String,
    pub country: String,
}

impl EventRecord {
    pub fn new(
        date: NaiveDate,
        event_type: impl Into<String>,
        country: impl Into<String>,
        count: u64,
    ) -> Self {
        Self {
            date,
            event_type: event_type.into(),
            country: country.into(),
            count,
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            date: self.date,
            event_type: self.event_type.clone(),
            country: self.country.clone(),
        }
    }
}

/// Country name from a GDELT `GEO_FULLNAME` value.
///
/// `"Alaska, United States"` → `"United States"`, `"France"` → `"France"`.
/// Empty or whitespace-only values yield `None`.
pub fn country_from_geo(full_name: &str) -> Option<&str> {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let country = match trimmed.rsplit_once(',') {
        Some((_, tail)) => tail.trim(),
        None => trimmed,
    };
    if country.is_empty() {
        None
    } else {
        Some(country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_after_last_comma() {
        assert_eq!(
            country_from_geo("Anchorage, Alaska, United States"),
            Some("United States")
        );
        assert_eq!(country_from_geo("  France "), Some("France"));
    }

    #[test]
    fn empty_geo_has_no_country() {
        assert_eq!(country_from_geo(""), None);
        assert_eq!(country_from_geo("   "), None);
        assert_eq!(country_from_geo("Somewhere, "), None);
    }

    #[test]
    fn key_ignores_count() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let a = EventRecord::new(d, "PROTEST", "India", 3);
        let b = EventRecord::new(d, "PROTEST", "India", 7);
        assert_eq!(a.key(), b.key());
    }
}

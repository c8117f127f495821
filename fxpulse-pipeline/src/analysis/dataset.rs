//! Derived daily tables built from the two raw stores.
//!
//! Nothing here is persisted; every run recomputes from the stored records.

use chrono::{Datelike, NaiveDate};
use fxpulse_core::domain::{CurrencyRecord, EventRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Daily percentage change series for one currency, keyed by date.
pub type PctSeries = BTreeMap<NaiveDate, f64>;

/// Closes grouped by quote currency, ascending by date.
pub fn closes_by_currency(records: &[CurrencyRecord]) -> BTreeMap<String, Vec<(NaiveDate, f64)>> {
    let mut out: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for r in records {
        if r.close.is_finite() && r.close > 0.0 {
            out.entry(r.pair.quote().to_string())
                .or_default()
                .insert(r.date, r.close);
        }
    }
    out.into_iter()
        .map(|(cur, series)| (cur, series.into_iter().collect()))
        .collect()
}

/// `(close_t / close_{t-1} − 1) × 100` between consecutive stored closes.
pub fn pct_changes(records: &[CurrencyRecord]) -> BTreeMap<String, PctSeries> {
    closes_by_currency(records)
        .into_iter()
        .map(|(cur, closes)| {
            let series = closes
                .windows(2)
                .map(|w| (w[1].0, (w[1].1 / w[0].1 - 1.0) * 100.0))
                .collect();
            (cur, series)
        })
        .collect()
}

/// Mean of the available pair changes per date. Pairs are quoted per USD,
/// so a positive value means USD strengthened.
pub fn usd_strength(pct: &BTreeMap<String, PctSeries>) -> BTreeMap<NaiveDate, f64> {
    let mut acc: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for series in pct.values() {
        for (date, value) in series {
            let slot = acc.entry(*date).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    acc.into_iter()
        .map(|(date, (sum, n))| (date, sum / n as f64))
        .collect()
}

/// Counts summed over countries per `(date, event_type)`.
pub fn daily_type_counts(events: &[EventRecord]) -> BTreeMap<NaiveDate, BTreeMap<String, u64>> {
    let mut out: BTreeMap<NaiveDate, BTreeMap<String, u64>> = BTreeMap::new();
    for e in events {
        *out.entry(e.date)
            .or_default()
            .entry(e.event_type.clone())
            .or_default() += e.count;
    }
    out
}

/// Total count per event type over the whole history, descending, ties by name.
pub fn type_totals(events: &[EventRecord]) -> Vec<(String, u64)> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for e in events {
        *totals.entry(e.event_type.as_str()).or_default() += e.count;
    }
    let mut ranked: Vec<(String, u64)> = totals
        .into_iter()
        .map(|(t, c)| (t.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// USD strength joined with per-type event counts.
///
/// Rows are the dates present in both series; a type with no record on a
/// joined date counts 0.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DerivedDataset {
    pub dates: Vec<NaiveDate>,
    pub usd_strength: Vec<f64>,
    /// Sorted event type names; one count column per name.
    pub event_types: Vec<String>,
    /// `counts[type][row]`
    pub counts: Vec<Vec<f64>>,
}

impl DerivedDataset {
    pub fn build(currencies: &[CurrencyRecord], events: &[EventRecord]) -> Self {
        let strength = usd_strength(&pct_changes(currencies));
        let by_day = daily_type_counts(events);

        let dates: Vec<NaiveDate> = strength
            .keys()
            .filter(|d| by_day.contains_key(*d))
            .copied()
            .collect();
        let event_types: Vec<String> = dates
            .iter()
            .flat_map(|d| by_day[d].keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let counts = event_types
            .iter()
            .map(|t| {
                dates
                    .iter()
                    .map(|d| by_day[d].get(t).copied().unwrap_or(0) as f64)
                    .collect()
            })
            .collect();

        Self {
            usd_strength: dates.iter().map(|d| strength[d]).collect(),
            dates,
            event_types,
            counts,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Sum of one type's column.
    pub fn total(&self, type_idx: usize) -> f64 {
        self.counts[type_idx].iter().sum()
    }
}

/// One named line on a trend chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Closes rebased so each currency's first stored close is 100.
pub fn rebased_closes(records: &[CurrencyRecord], currencies: &[String]) -> Vec<LineSeries> {
    let closes = closes_by_currency(records);
    currencies
        .iter()
        .filter_map(|cur| {
            let series = closes.get(&cur.to_ascii_uppercase())?;
            let first = series.first()?.1;
            Some(LineSeries {
                name: cur.to_ascii_uppercase(),
                points: series
                    .iter()
                    .map(|(d, c)| (*d, c / first * 100.0))
                    .collect(),
            })
        })
        .collect()
}

/// Monthly event totals for the `top_n` most frequent types, dated at the
/// first of each month. Months without a type's events count 0.
pub fn monthly_event_volume(events: &[EventRecord], top_n: usize) -> Vec<LineSeries> {
    let month_of = |d: NaiveDate| d.with_day(1).unwrap_or(d);

    let months: BTreeSet<NaiveDate> = events.iter().map(|e| month_of(e.date)).collect();
    let mut per_type: BTreeMap<&str, BTreeMap<NaiveDate, u64>> = BTreeMap::new();
    for e in events {
        *per_type
            .entry(e.event_type.as_str())
            .or_default()
            .entry(month_of(e.date))
            .or_default() += e.count;
    }

    type_totals(events)
        .into_iter()
        .take(top_n)
        .map(|(event_type, _)| {
            let monthly = per_type.get(event_type.as_str());
            LineSeries {
                points: months
                    .iter()
                    .map(|m| {
                        let v = monthly.and_then(|s| s.get(m)).copied().unwrap_or(0);
                        (*m, v as f64)
                    })
                    .collect(),
                name: event_type,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use fxpulse_core::domain::CurrencyPair;

    pub fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + chrono::Duration::days(i)
    }

    /// Six closes per currency giving EUR changes [1, −1, 2, 0, 1] and
    /// JPY changes [3, 1, 0, 2, −1] on days 1..=5.
    pub fn reference_currencies() -> Vec<CurrencyRecord> {
        let eur = [100.0, 101.0, 99.99, 101.9898, 101.9898, 103.009698];
        let jpy = [100.0, 103.0, 104.03, 104.03, 106.1106, 105.049494];
        let mut out = Vec::new();
        for (code, closes) in [("EUR", eur), ("JPY", jpy)] {
            let pair = CurrencyPair::new("USD", code).unwrap();
            for (i, close) in closes.iter().enumerate() {
                out.push(CurrencyRecord::new(day(i as i64), pair.clone(), *close));
            }
        }
        out
    }

    /// Type A counts [1..=5] and type B counts [2, 1, 4, 3, 5] on days 1..=5,
    /// split across two countries.
    pub fn reference_events() -> Vec<EventRecord> {
        let a = [1u64, 2, 3, 4, 5];
        let b = [2u64, 1, 4, 3, 5];
        let mut out = Vec::new();
        for i in 0..5 {
            let d = day(i as i64 + 1);
            out.push(EventRecord::new(d, "A", "France", 1));
            if a[i] > 1 {
                out.push(EventRecord::new(d, "A", "Japan", a[i] - 1));
            }
            out.push(EventRecord::new(d, "B", "Japan", b[i]));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn pct_changes_are_unrounded_consecutive_changes() {
        let pct = pct_changes(&reference_currencies());
        let eur: Vec<f64> = pct["EUR"].values().copied().collect();
        let expected = [1.0, -1.0, 2.0, 0.0, 1.0];
        assert_eq!(eur.len(), 5);
        for (got, want) in eur.iter().zip(expected) {
            assert!(close(*got, want), "{got} != {want}");
        }
        assert!(!pct["EUR"].contains_key(&day(0)));
    }

    #[test]
    fn joined_dataset_matches_reference() {
        let ds = DerivedDataset::build(&reference_currencies(), &reference_events());
        assert_eq!(ds.dates, (1..=5).map(day).collect::<Vec<_>>());
        assert_eq!(ds.event_types, vec!["A", "B"]);
        assert_eq!(ds.counts[0], vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ds.counts[1], vec![2.0, 1.0, 4.0, 3.0, 5.0]);
        for (got, want) in ds.usd_strength.iter().zip([2.0, 0.0, 1.0, 1.0, 0.0]) {
            assert!(close(*got, want));
        }
    }

    #[test]
    fn join_drops_dates_missing_from_either_side() {
        let mut events = reference_events();
        events.retain(|e| e.date != day(3));
        // Event on a date with no currency change
        events.push(EventRecord::new(day(0), "C", "India", 9));

        let ds = DerivedDataset::build(&reference_currencies(), &events);
        assert_eq!(ds.len(), 4);
        assert!(!ds.dates.contains(&day(3)));
        assert!(!ds.event_types.contains(&"C".to_string()));
    }

    #[test]
    fn missing_types_fill_zero() {
        let mut events = reference_events();
        events.push(EventRecord::new(day(2), "C", "India", 4));
        let ds = DerivedDataset::build(&reference_currencies(), &events);
        assert_eq!(ds.counts[2], vec![0.0, 4.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rebased_closes_start_at_100() {
        let lines = rebased_closes(&reference_currencies(), &["jpy".into(), "GBP".into()]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].name, "JPY");
        assert_eq!(lines[0].points[0].1, 100.0);
        assert!(close(lines[0].points[1].1, 103.0));
    }

    #[test]
    fn monthly_volume_ranks_types() {
        let events = vec![
            EventRecord::new(day(0), "KILL", "France", 3),
            EventRecord::new(day(40), "KILL", "France", 1),
            EventRecord::new(day(0), "PROTEST", "India", 10),
            EventRecord::new(day(1), "ARREST", "India", 1),
        ];
        let lines = monthly_event_volume(&events, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name, "PROTEST");
        assert_eq!(lines[1].name, "KILL");
        assert_eq!(lines[1].points.len(), 2);
        assert_eq!(lines[0].points[1].1, 0.0);
    }
}

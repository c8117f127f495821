//! Z-score spikes and dips per currency, and the events that preceded them.

use super::dataset::PctSeries;
use super::stats::{mean, sample_std};
use chrono::{Duration, NaiveDate};
use fxpulse_core::domain::EventRecord;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SpikeKind {
    Spike,
    Dip,
}

impl SpikeKind {
    pub fn label(self) -> &'static str {
        match self {
            SpikeKind::Spike => "SPIKE",
            SpikeKind::Dip => "DIP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpikeEvent {
    pub date: NaiveDate,
    pub currency: String,
    pub kind: SpikeKind,
    pub pct_change: f64,
    pub z_score: f64,
    /// Most frequent event types the day before, in the currency's countries.
    pub preceding_events: Vec<(String, u64)>,
}

/// How often an event type appears among the preceding events of one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecedingEventShare {
    pub kind: SpikeKind,
    pub event_type: String,
    pub occurrences: usize,
    /// Share of all preceding-event occurrences for this kind, in percent.
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpikeReport {
    pub events: Vec<SpikeEvent>,
    pub shares: Vec<PrecedingEventShare>,
}

#[derive(Debug, Clone)]
pub struct SpikeParams<'a> {
    pub z_threshold: f64,
    pub top_events: usize,
    pub currency_countries: &'a BTreeMap<String, Vec<String>>,
}

/// Flag |z| ≥ threshold per currency and attach the preceding day's top events.
pub fn detect_spikes(
    pct: &BTreeMap<String, PctSeries>,
    events: &[EventRecord],
    params: &SpikeParams<'_>,
) -> SpikeReport {
    let mut found = Vec::new();

    for (currency, series) in pct {
        let values: Vec<f64> = series.values().copied().collect();
        let m = mean(&values);
        let sd = sample_std(&values);
        if sd == 0.0 {
            tracing::debug!(%currency, "flat series; no spikes");
            continue;
        }

        let countries: HashSet<&str> = params
            .currency_countries
            .get(currency)
            .map(|cs| cs.iter().map(String::as_str).collect())
            .unwrap_or_default();

        for (date, value) in series {
            let z = (value - m) / sd;
            let kind = if z >= params.z_threshold {
                SpikeKind::Spike
            } else if z <= -params.z_threshold {
                SpikeKind::Dip
            } else {
                continue;
            };
            found.push(SpikeEvent {
                date: *date,
                currency: currency.clone(),
                kind,
                pct_change: *value,
                z_score: z,
                preceding_events: top_events_before(events, *date, &countries, params.top_events),
            });
        }
    }

    found.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.currency.cmp(&b.currency)));
    let shares = preceding_shares(&found);
    tracing::info!(spikes = found.len(), "detected currency spikes and dips");
    SpikeReport {
        events: found,
        shares,
    }
}

fn top_events_before(
    events: &[EventRecord],
    date: NaiveDate,
    countries: &HashSet<&str>,
    top_n: usize,
) -> Vec<(String, u64)> {
    if countries.is_empty() {
        return Vec::new();
    }
    let prev = date - Duration::days(1);
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for e in events {
        if e.date == prev && countries.contains(e.country.as_str()) {
            *totals.entry(e.event_type.as_str()).or_default() += e.count;
        }
    }
    let mut ranked: Vec<(String, u64)> = totals
        .into_iter()
        .map(|(t, c)| (t.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    ranked
}

fn preceding_shares(found: &[SpikeEvent]) -> Vec<PrecedingEventShare> {
    let mut occurrences: BTreeMap<(SpikeKind, &str), usize> = BTreeMap::new();
    let mut per_kind: BTreeMap<SpikeKind, usize> = BTreeMap::new();
    for spike in found {
        for (event_type, _) in &spike.preceding_events {
            *occurrences.entry((spike.kind, event_type.as_str())).or_default() += 1;
            *per_kind.entry(spike.kind).or_default() += 1;
        }
    }
    let mut shares: Vec<PrecedingEventShare> = occurrences
        .into_iter()
        .map(|((kind, event_type), n)| PrecedingEventShare {
            kind,
            event_type: event_type.to_string(),
            occurrences: n,
            percentage: n as f64 / per_kind[&kind] as f64 * 100.0,
        })
        .collect();
    // Per kind, most frequent first
    shares.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| b.occurrences.cmp(&a.occurrences))
            .then_with(|| a.event_type.cmp(&b.event_type))
    });
    shares
}

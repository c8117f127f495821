//! Fetch orchestrator: pulls both sources for the pending window and appends
//! them to their stores.
//!
//! The two sources are independent: an error in one is logged and recorded in
//! its report, and the other still runs. Nothing is retried within a run; the
//! next scheduled run starts again from the stored watermark.

use super::provider::{DataError, EventProvider, RateProvider};
use super::store::{AppendSummary, ParquetStore};
use crate::domain::{CurrencyPair, CurrencyRecord, EventRecord};
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

/// Days before yesterday for which a missing event file is treated as late
/// rather than lost.
pub const EVENT_GRACE_DAYS: i64 = 2;

/// Window parameters for one run.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub today: NaiveDate,
    /// How far back an empty store starts.
    pub initial_lookback_days: u32,
    /// Upper bound on event files downloaded per run.
    pub max_event_days: u32,
}

impl FetchPlan {
    fn first_day(&self) -> NaiveDate {
        self.today - Duration::days(self.initial_lookback_days as i64)
    }
}

/// What happened to one source during a run.
#[derive(Debug)]
pub struct SourceReport {
    pub source: String,
    /// Inclusive date window requested, if anything was pending.
    pub window: Option<(NaiveDate, NaiveDate)>,
    pub fetched: usize,
    pub append: AppendSummary,
    pub errors: Vec<(String, DataError)>,
    /// True when the source stopped early (rate limit, block, missing day).
    pub stopped_early: bool,
}

impl SourceReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            window: None,
            fetched: 0,
            append: AppendSummary::default(),
            errors: Vec::new(),
            stopped_early: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.window.is_none() && self.errors.is_empty()
    }

    fn widen(&mut self, start: NaiveDate, end: NaiveDate) {
        self.window = Some(match self.window {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }
}

/// Reports for both sources.
#[derive(Debug)]
pub struct FetchSummary {
    pub currencies: SourceReport,
    pub events: SourceReport,
}

impl FetchSummary {
    pub fn all_clean(&self) -> bool {
        self.currencies.is_clean() && self.events.is_clean()
    }
}

/// Refresh both stores. Each source is attempted regardless of the other.
pub fn refresh_all(
    rates: &dyn RateProvider,
    events: &dyn EventProvider,
    currency_store: &ParquetStore<CurrencyRecord>,
    event_store: &ParquetStore<EventRecord>,
    pairs: &[CurrencyPair],
    plan: &FetchPlan,
) -> FetchSummary {
    FetchSummary {
        currencies: refresh_currencies(rates, currency_store, pairs, plan),
        events: refresh_events(events, event_store, plan),
    }
}

/// Fetch every pair from the day after its own last stored date through today.
pub fn refresh_currencies(
    provider: &dyn RateProvider,
    store: &ParquetStore<CurrencyRecord>,
    pairs: &[CurrencyPair],
    plan: &FetchPlan,
) -> SourceReport {
    let mut report = SourceReport::new(provider.name());

    let stored = match store.load() {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "currency store unreadable; skipping currency source");
            report.errors.push(("store".into(), e));
            return report;
        }
    };
    let mut watermarks: HashMap<CurrencyPair, NaiveDate> = HashMap::new();
    for record in &stored {
        let last = watermarks.entry(record.pair.clone()).or_insert(record.date);
        if record.date > *last {
            *last = record.date;
        }
    }

    let mut fetched: Vec<CurrencyRecord> = Vec::new();
    for (i, pair) in pairs.iter().enumerate() {
        let start = watermarks
            .get(pair)
            .map(|d| *d + Duration::days(1))
            .unwrap_or_else(|| plan.first_day());
        if start > plan.today {
            continue;
        }
        report.widen(start, plan.today);

        match provider.fetch_rates(pair, start, plan.today) {
            Ok(records) => {
                tracing::debug!(%pair, rows = records.len(), "fetched rates");
                fetched.extend(records);
            }
            Err(e) => {
                tracing::warn!(%pair, error = %e, "rate fetch failed");
                let abort = e.aborts_source();
                report.errors.push((pair.to_string(), e));
                if abort {
                    let skipped = pairs.len() - i - 1;
                    tracing::warn!(skipped, "stopping currency source for this run");
                    report.stopped_early = true;
                    break;
                }
            }
        }
    }

    append_into(store, fetched, &mut report);
    report
}

/// Fetch event files day by day from the day after the last stored date
/// through yesterday.
///
/// The source stops when the provider is unreachable or refusing requests, or
/// when a file inside the grace window is not published yet; those days are
/// retried by the next run. Older missing or unreadable files are logged and
/// skipped so a permanent hole does not hold back the days after it.
pub fn refresh_events(
    provider: &dyn EventProvider,
    store: &ParquetStore<EventRecord>,
    plan: &FetchPlan,
) -> SourceReport {
    let mut report = SourceReport::new(provider.name());

    let start = match store.last_date() {
        Ok(Some(last)) => last + Duration::days(1),
        Ok(None) => plan.first_day(),
        Err(e) => {
            tracing::warn!(error = %e, "event store unreadable; skipping event source");
            report.errors.push(("store".into(), e));
            return report;
        }
    };
    // A day's file is published after the day ends
    let yesterday = plan.today - Duration::days(1);
    let cap = start + Duration::days(plan.max_event_days.max(1) as i64 - 1);
    let end = yesterday.min(cap);
    if start > end {
        return report;
    }
    report.widen(start, end);

    let mut fetched: Vec<EventRecord> = Vec::new();
    let mut day = start;
    while day <= end {
        match provider.fetch_day(day) {
            Ok(records) => {
                tracing::debug!(%day, rows = records.len(), "fetched events");
                fetched.extend(records);
            }
            Err(e) => {
                let late = matches!(e, DataError::NotPublished { .. })
                    && day >= yesterday - Duration::days(EVENT_GRACE_DAYS);
                let stop = late || e.aborts_source();
                if late {
                    tracing::info!(%day, "event file not published yet");
                } else if stop {
                    tracing::warn!(%day, error = %e, "event fetch failed; stopping event source");
                } else {
                    tracing::warn!(%day, error = %e, "event fetch failed; skipping day");
                }
                report.errors.push((day.to_string(), e));
                if stop {
                    report.stopped_early = day < end;
                    break;
                }
            }
        }
        day += Duration::days(1);
    }

    append_into(store, fetched, &mut report);
    report
}

fn append_into<R: super::store::StoreRecord>(
    store: &ParquetStore<R>,
    records: Vec<R>,
    report: &mut SourceReport,
) {
    report.fetched = records.len();
    if records.is_empty() {
        return;
    }
    match store.append(records) {
        Ok(summary) => {
            tracing::info!(
                source = %report.source,
                inserted = summary.inserted,
                duplicates = summary.duplicates,
                "store updated"
            );
            report.append = summary;
        }
        Err(e) => {
            tracing::warn!(source = %report.source, error = %e, "append failed; store left unchanged");
            report.errors.push(("append".into(), e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn plan() -> FetchPlan {
        FetchPlan {
            today: d(3, 10),
            initial_lookback_days: 5,
            max_event_days: 31,
        }
    }

    fn pair(code: &str) -> CurrencyPair {
        CurrencyPair::new("USD", code).unwrap()
    }

    /// Returns one close per day; fails for the listed quote currencies.
    struct FakeRates {
        failing: Vec<(&'static str, fn() -> DataError)>,
        calls: RefCell<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl FakeRates {
        fn new() -> Self {
            Self {
                failing: Vec::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl RateProvider for FakeRates {
        fn name(&self) -> &str {
            "fake_rates"
        }

        fn fetch_rates(
            &self,
            pair: &CurrencyPair,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<CurrencyRecord>, DataError> {
            self.calls
                .borrow_mut()
                .push((pair.to_string(), start, end));
            if let Some((_, err)) = self.failing.iter().find(|(q, _)| *q == pair.quote()) {
                return Err(err());
            }
            Ok(start
                .iter_days()
                .take_while(|day| *day <= end)
                .map(|day| CurrencyRecord::new(day, pair.clone(), 1.0))
                .collect())
        }
    }

    /// One PROTEST row per day; days after `published_until` are not published.
    struct FakeEvents {
        published_until: NaiveDate,
    }

    impl EventProvider for FakeEvents {
        fn name(&self) -> &str {
            "fake_events"
        }

        fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EventRecord>, DataError> {
            if date > self.published_until {
                return Err(DataError::NotPublished { date });
            }
            Ok(vec![EventRecord::new(date, "PROTEST", "India", 1)])
        }
    }

    /// Publishes every day except the listed ones.
    struct GappyEvents {
        missing: Vec<NaiveDate>,
    }

    impl EventProvider for GappyEvents {
        fn name(&self) -> &str {
            "gappy_events"
        }

        fn fetch_day(&self, date: NaiveDate) -> Result<Vec<EventRecord>, DataError> {
            if self.missing.contains(&date) {
                return Err(DataError::NotPublished { date });
            }
            Ok(vec![EventRecord::new(date, "PROTEST", "India", 1)])
        }
    }

    #[test]
    fn first_run_uses_lookback_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let rates = FakeRates::new();

        let report = refresh_currencies(&rates, &store, &[pair("EUR")], &plan());
        assert!(report.is_clean());
        assert_eq!(report.window, Some((d(3, 5), d(3, 10))));
        assert_eq!(report.append.inserted, 6);
    }

    #[test]
    fn each_pair_resumes_from_its_own_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store
            .append(vec![
                CurrencyRecord::new(d(3, 8), pair("EUR"), 1.0),
                CurrencyRecord::new(d(3, 3), pair("JPY"), 150.0),
            ])
            .unwrap();

        let rates = FakeRates::new();
        refresh_currencies(&rates, &store, &[pair("EUR"), pair("JPY")], &plan());

        let calls = rates.calls.borrow();
        assert_eq!(calls[0], ("USDEUR".to_string(), d(3, 9), d(3, 10)));
        assert_eq!(calls[1], ("USDJPY".to_string(), d(3, 4), d(3, 10)));
    }

    #[test]
    fn up_to_date_pairs_are_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        store
            .append(vec![CurrencyRecord::new(d(3, 10), pair("EUR"), 1.0)])
            .unwrap();

        let rates = FakeRates::new();
        let report = refresh_currencies(&rates, &store, &[pair("EUR")], &plan());
        assert!(rates.calls.borrow().is_empty());
        assert!(report.is_up_to_date());
    }

    #[test]
    fn failing_pair_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let mut rates = FakeRates::new();
        rates.failing.push(("GBP", || DataError::SymbolNotFound {
            symbol: "USDGBP=X".into(),
        }));

        let report =
            refresh_currencies(&rates, &store, &[pair("GBP"), pair("EUR")], &plan());
        assert_eq!(report.errors.len(), 1);
        assert!(!report.stopped_early);
        assert_eq!(report.append.inserted, 6);
    }

    #[test]
    fn rate_limit_stops_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let mut rates = FakeRates::new();
        rates.failing.push(("GBP", || DataError::RateLimited {
            retry_after_secs: 60,
        }));

        let report =
            refresh_currencies(&rates, &store, &[pair("GBP"), pair("EUR")], &plan());
        assert!(report.stopped_early);
        assert_eq!(rates.calls.borrow().len(), 1);
        assert_eq!(report.append.inserted, 0);
    }

    #[test]
    fn events_stop_at_first_unpublished_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let events = FakeEvents {
            published_until: d(3, 7),
        };

        let report = refresh_events(&events, &store, &plan());
        // Window is lookback start through yesterday
        assert_eq!(report.window, Some((d(3, 5), d(3, 9))));
        assert_eq!(report.append.inserted, 3);
        assert!(report.stopped_early);
        assert_eq!(store.last_date().unwrap(), Some(d(3, 7)));

        // Next run picks up where this one stopped
        let events = FakeEvents {
            published_until: d(3, 9),
        };
        let report = refresh_events(&events, &store, &plan());
        assert_eq!(report.window, Some((d(3, 8), d(3, 9))));
        assert!(report.is_clean());
        assert_eq!(store.load().unwrap().len(), 5);
    }

    #[test]
    fn event_days_are_capped_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let events = FakeEvents {
            published_until: d(12, 31),
        };
        let plan = FetchPlan {
            max_event_days: 2,
            ..plan()
        };

        let report = refresh_events(&events, &store, &plan);
        assert_eq!(report.window, Some((d(3, 5), d(3, 6))));
        assert_eq!(report.append.inserted, 2);
    }

    #[test]
    fn one_source_failing_leaves_the_other_running() {
        let dir = tempfile::tempdir().unwrap();
        let currency_store = ParquetStore::new(dir.path());
        let event_store = ParquetStore::new(dir.path());
        let mut rates = FakeRates::new();
        rates.failing.push(("EUR", || DataError::Blocked));
        let events = FakeEvents {
            published_until: d(3, 9),
        };

        let summary = refresh_all(
            &rates,
            &events,
            &currency_store,
            &event_store,
            &[pair("EUR")],
            &plan(),
        );
        assert!(!summary.all_clean());
        assert!(!summary.currencies.is_clean());
        assert!(summary.events.is_clean());
        assert_eq!(event_store.load().unwrap().len(), 5);
        assert!(currency_store.load().unwrap().is_empty());
    }

    #[test]
    fn old_missing_day_is_skipped_not_retried_forever() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let events = GappyEvents {
            missing: vec![d(3, 6)],
        };

        let report = refresh_events(&events, &store, &plan());
        assert_eq!(report.window, Some((d(3, 5), d(3, 9))));
        assert_eq!(report.errors.len(), 1);
        assert!(!report.stopped_early);
        assert_eq!(report.append.inserted, 4);
        assert_eq!(store.last_date().unwrap(), Some(d(3, 9)));

        // Later runs move on past the gap
        for today in [d(3, 20), d(4, 10)] {
            let plan = FetchPlan { today, ..plan() };
            let report = refresh_events(&events, &store, &plan);
            assert!(report.is_clean());
            assert!(report.append.inserted > 0);
            assert_eq!(store.last_date().unwrap(), Some(today - Duration::days(1)));
        }
    }

    #[test]
    fn late_day_inside_grace_window_stops_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let events = GappyEvents {
            missing: vec![d(3, 7)],
        };

        let report = refresh_events(&events, &store, &plan());
        assert!(report.stopped_early);
        assert_eq!(report.append.inserted, 2);
        assert_eq!(store.last_date().unwrap(), Some(d(3, 6)));
    }

    #[test]
    fn quarantined_range_is_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path());
        let events = FakeEvents {
            published_until: d(3, 9),
        };
        refresh_events(&events, &store, &plan());
        assert_eq!(store.load().unwrap().len(), 5);

        std::fs::write(store.dir().join("2024.parquet"), b"junk").unwrap();

        let report = refresh_events(&events, &store, &plan());
        assert_eq!(report.window, Some((d(3, 5), d(3, 9))));
        assert_eq!(report.append.inserted, 5);
        assert_eq!(store.load().unwrap().len(), 5);
    }
}

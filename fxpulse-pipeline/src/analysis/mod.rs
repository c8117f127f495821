//! Analyzer: joins the two stores and derives every statistic the dashboard shows.
//!
//! `analyze` is a pure function of the stored records and the config; nothing
//! it produces is written back to the stores.

pub mod correlation;
pub mod currency_models;
pub mod dataset;
pub mod ols;
pub mod regression;
pub mod spikes;
pub mod stats;

pub use correlation::{correlation_matrix, CorrelationMatrix};
pub use currency_models::{fit_currency_models, CurrencyModel, FeatureWeight, ModelParams};
pub use dataset::{DerivedDataset, LineSeries, PctSeries};
pub use regression::{fit_usd_strength, EventImpact, Impact, RegressionResult};
pub use spikes::{detect_spikes, PrecedingEventShare, SpikeEvent, SpikeKind, SpikeParams, SpikeReport};

use crate::config::PipelineConfig;
use chrono::NaiveDate;
use fxpulse_core::domain::{CurrencyRecord, EventRecord};
use serde::Serialize;

/// Number of event types drawn on the monthly volume chart.
const EVENT_TREND_TYPES: usize = 8;

/// Date coverage and sizes of the inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Coverage {
    pub currency_start: Option<NaiveDate>,
    pub currency_end: Option<NaiveDate>,
    pub event_start: Option<NaiveDate>,
    pub event_end: Option<NaiveDate>,
    pub currency_rows: usize,
    pub event_rows: usize,
    pub currencies: usize,
    pub event_types: usize,
    /// Days present in both the USD strength and event series.
    pub joined_days: usize,
}

/// Series for the chart assets. Not part of the JSON export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trends {
    pub currencies: Vec<LineSeries>,
    pub events: Vec<LineSeries>,
    /// Stored count per event type, descending.
    pub event_totals: Vec<(String, u64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub coverage: Coverage,
    pub regression: RegressionResult,
    pub correlation: CorrelationMatrix,
    pub spikes: SpikeReport,
    pub currency_models: Vec<CurrencyModel>,
    #[serde(skip)]
    pub trends: Trends,
}

pub fn analyze(
    currencies: &[CurrencyRecord],
    events: &[EventRecord],
    config: &PipelineConfig,
) -> Analysis {
    let pct = dataset::pct_changes(currencies);
    let ds = DerivedDataset::build(currencies, events);
    let event_totals = dataset::type_totals(events);

    let coverage = Coverage {
        currency_start: currencies.iter().map(|r| r.date).min(),
        currency_end: currencies.iter().map(|r| r.date).max(),
        event_start: events.iter().map(|r| r.date).min(),
        event_end: events.iter().map(|r| r.date).max(),
        currency_rows: currencies.len(),
        event_rows: events.len(),
        currencies: pct.len(),
        event_types: event_totals.len(),
        joined_days: ds.len(),
    };
    tracing::info!(
        currency_rows = coverage.currency_rows,
        event_rows = coverage.event_rows,
        joined_days = coverage.joined_days,
        "analyzing"
    );

    let countries = config.countries_by_currency();
    let regression = fit_usd_strength(&ds);
    let correlation = correlation_matrix(&pct);
    let spikes = detect_spikes(
        &pct,
        events,
        &SpikeParams {
            z_threshold: config.spike_z_threshold,
            top_events: config.spike_top_events,
            currency_countries: &countries,
        },
    );
    let currency_models = fit_currency_models(
        &pct,
        events,
        &ModelParams {
            top_event_types: config.model_top_event_types,
            test_fraction: config.test_fraction,
            currency_countries: &countries,
        },
    );
    let trends = Trends {
        currencies: dataset::rebased_closes(currencies, &config.trend_currencies),
        events: dataset::monthly_event_volume(events, EVENT_TREND_TYPES),
        event_totals,
    };

    Analysis {
        coverage,
        regression,
        correlation,
        spikes,
        currency_models,
        trends,
    }
}

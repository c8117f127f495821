//! Per-currency next-day models on the events of the currency's own countries.
//!
//! Features per day: total events, distinct event types, and the counts of the
//! most frequent types overall. Target: the next joined row's percentage
//! change. Rows are split chronologically; the tail is held out for RMSE/MAE.

use super::dataset::{type_totals, PctSeries};
use super::ols::ols;
use chrono::NaiveDate;
use fxpulse_core::domain::EventRecord;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const TOTAL_EVENTS: &str = "total_events";
pub const DISTINCT_TYPES: &str = "distinct_event_types";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    /// `None` when the feature was constant or linearly dependent in training.
    pub coef: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyModel {
    pub currency: String,
    pub intercept: f64,
    pub weights: Vec<FeatureWeight>,
    pub r_squared_train: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub rmse: f64,
    pub mae: f64,
}

#[derive(Debug, Clone)]
pub struct ModelParams<'a> {
    pub top_event_types: usize,
    pub test_fraction: f64,
    pub currency_countries: &'a BTreeMap<String, Vec<String>>,
}

struct ModelTable {
    features: Vec<String>,
    /// `columns[feature][row]`
    columns: Vec<Vec<f64>>,
    target: Vec<f64>,
}

/// Fit one model per currency in `pct` that has mapped countries with events.
pub fn fit_currency_models(
    pct: &BTreeMap<String, PctSeries>,
    events: &[EventRecord],
    params: &ModelParams<'_>,
) -> Vec<CurrencyModel> {
    let top_types: Vec<String> = type_totals(events)
        .into_iter()
        .take(params.top_event_types)
        .map(|(t, _)| t)
        .collect();

    let mut models = Vec::new();
    for (currency, series) in pct {
        let Some(countries) = params.currency_countries.get(currency) else {
            tracing::debug!(%currency, "no mapped countries; model skipped");
            continue;
        };
        let Some(table) = model_table(series, events, countries, &top_types) else {
            tracing::info!(%currency, "no events for mapped countries; model skipped");
            continue;
        };
        match fit_one(currency, &table, params.test_fraction) {
            Some(model) => models.push(model),
            None => tracing::info!(%currency, rows = table.target.len(), "too few rows; model skipped"),
        }
    }
    tracing::info!(models = models.len(), "fitted per-currency models");
    models
}

fn model_table(
    series: &PctSeries,
    events: &[EventRecord],
    countries: &[String],
    top_types: &[String],
) -> Option<ModelTable> {
    let wanted: HashSet<&str> = countries.iter().map(String::as_str).collect();
    let mut by_day: BTreeMap<NaiveDate, BTreeMap<&str, u64>> = BTreeMap::new();
    for e in events {
        if wanted.contains(e.country.as_str()) {
            *by_day
                .entry(e.date)
                .or_default()
                .entry(e.event_type.as_str())
                .or_default() += e.count;
        }
    }
    if by_day.is_empty() {
        return None;
    }

    // Inner join, then each row's target is the next row's change
    let joined: Vec<(&BTreeMap<&str, u64>, f64)> = series
        .iter()
        .filter_map(|(d, v)| by_day.get(d).map(|counts| (counts, *v)))
        .collect();
    if joined.len() < 2 {
        return Some(ModelTable {
            features: Vec::new(),
            columns: Vec::new(),
            target: Vec::new(),
        });
    }
    let rows = &joined[..joined.len() - 1];

    let mut features = vec![TOTAL_EVENTS.to_string(), DISTINCT_TYPES.to_string()];
    features.extend(top_types.iter().map(|t| format!("evt_{t}")));

    let mut columns = vec![
        rows.iter().map(|(c, _)| c.values().sum::<u64>() as f64).collect(),
        rows.iter()
            .map(|(c, _)| c.values().filter(|n| **n > 0).count() as f64)
            .collect(),
    ];
    for t in top_types {
        columns.push(
            rows.iter()
                .map(|(c, _)| c.get(t.as_str()).copied().unwrap_or(0) as f64)
                .collect(),
        );
    }

    Some(ModelTable {
        features,
        columns,
        target: joined[1..].iter().map(|(_, v)| *v).collect(),
    })
}

fn fit_one(currency: &str, table: &ModelTable, test_fraction: f64) -> Option<CurrencyModel> {
    let n = table.target.len();
    let split = (n as f64 * (1.0 - test_fraction)).floor() as usize;
    if split == 0 || split >= n {
        return None;
    }

    let train_cols: Vec<Vec<f64>> = table.columns.iter().map(|c| c[..split].to_vec()).collect();
    let fit = ols(&table.target[..split], &train_cols)?;

    let errors: Vec<f64> = (split..n)
        .map(|row| {
            let x: Vec<f64> = table.columns.iter().map(|c| c[row]).collect();
            fit.predict(&x) - table.target[row]
        })
        .collect();
    let n_test = errors.len();
    let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n_test as f64).sqrt();
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n_test as f64;

    Some(CurrencyModel {
        currency: currency.to_string(),
        intercept: fit.intercept.value,
        weights: table
            .features
            .iter()
            .zip(&fit.coefficients)
            .map(|(feature, est)| FeatureWeight {
                feature: feature.clone(),
                coef: est.as_ref().map(|e| e.value),
                p_value: est.as_ref().and_then(|e| e.p_value),
            })
            .collect(),
        r_squared_train: fit.r_squared,
        n_train: split,
        n_test,
        rmse,
        mae,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    fn countries() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("INR".to_string(), vec!["India".to_string()]),
            ("JPY".to_string(), vec!["Japan".to_string()]),
        ])
    }

    /// 30 days where next-day INR change tracks today's PROTEST count.
    fn fixture() -> (BTreeMap<String, PctSeries>, Vec<EventRecord>) {
        let mut events = Vec::new();
        let mut inr = PctSeries::new();
        for i in 0..30 {
            let protests = (i * 7 % 11) as u64 + 1;
            let kills = (i * 3 % 5) as u64 + 1;
            events.push(EventRecord::new(d(i), "PROTEST", "India", protests));
            events.push(EventRecord::new(d(i), "KILL", "India", kills));
            events.push(EventRecord::new(d(i), "KILL", "France", 4));
            let prev_protests = ((i - 1) * 7 % 11).rem_euclid(11) as f64 + 1.0;
            inr.insert(d(i), 0.1 * prev_protests - 0.5);
        }
        let jpy: PctSeries = (0..30).map(|i| (d(i), 0.01 * i as f64)).collect();
        (
            BTreeMap::from([("INR".to_string(), inr), ("JPY".to_string(), jpy)]),
            events,
        )
    }

    #[test]
    fn fits_mapped_currency_and_skips_unmatched() {
        let (pct, events) = fixture();
        let map = countries();
        let models = fit_currency_models(
            &pct,
            &events,
            &ModelParams {
                top_event_types: 5,
                test_fraction: 0.2,
                currency_countries: &map,
            },
        );

        // JPY has no events in Japan
        assert_eq!(models.len(), 1);
        let inr = &models[0];
        assert_eq!(inr.currency, "INR");
        // 30 joined rows, 29 with a next-day target, 80/20 split
        assert_eq!(inr.n_train, 23);
        assert_eq!(inr.n_test, 6);
        assert!(inr.rmse.is_finite() && inr.mae.is_finite());
        assert!(inr.mae <= inr.rmse + 1e-12);

        let names: Vec<&str> = inr.weights.iter().map(|w| w.feature.as_str()).collect();
        assert_eq!(names, vec![TOTAL_EVENTS, DISTINCT_TYPES, "evt_KILL", "evt_PROTEST"]);
        // Distinct types is always 2 here
        assert!(inr.weights[1].coef.is_none());
        // Next-day change is exactly linear in today's protests
        assert!(inr.rmse < 1e-6);
    }

    #[test]
    fn too_few_rows_skips_model() {
        let (mut pct, events) = fixture();
        for series in pct.values_mut() {
            series.retain(|d, _| *d < NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        }
        let map = countries();
        let models = fit_currency_models(
            &pct,
            &events,
            &ModelParams {
                top_event_types: 5,
                test_fraction: 0.2,
                currency_countries: &map,
            },
        );
        assert!(models.is_empty());
    }
}

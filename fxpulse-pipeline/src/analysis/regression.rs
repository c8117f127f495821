//! USD strength regressed on daily event-type counts.

use super::dataset::DerivedDataset;
use super::ols::{ols, Estimate};
use serde::Serialize;

/// Effect of an event type on the other currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Impact {
    /// Positive coefficient: more events, stronger USD.
    Weaken,
    /// Negative coefficient: more events, weaker USD.
    Strengthen,
    Neutral,
}

impl Impact {
    pub fn from_coef(coef: f64) -> Self {
        if coef > 0.0 {
            Impact::Weaken
        } else if coef < 0.0 {
            Impact::Strengthen
        } else {
            Impact::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Impact::Weaken => "Weaken",
            Impact::Strengthen => "Strengthen",
            Impact::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventImpact {
    pub event_type: String,
    /// 0.0 when not estimated.
    pub coef: f64,
    pub std_error: Option<f64>,
    pub t_stat: Option<f64>,
    pub p_value: Option<f64>,
    pub impact: Impact,
    /// False for types excluded from the fit (zero variance, or no fit at all).
    pub estimated: bool,
    /// Total count over the joined dates.
    pub total_count: f64,
}

impl EventImpact {
    fn neutral(event_type: &str, total_count: f64) -> Self {
        Self {
            event_type: event_type.to_string(),
            coef: 0.0,
            std_error: None,
            t_stat: None,
            p_value: None,
            impact: Impact::Neutral,
            estimated: false,
            total_count,
        }
    }

    fn fitted(event_type: &str, total_count: f64, est: &Estimate) -> Self {
        Self {
            event_type: event_type.to_string(),
            coef: est.value,
            std_error: est.std_error,
            t_stat: est.t_stat,
            p_value: est.p_value,
            impact: Impact::from_coef(est.value),
            estimated: true,
            total_count,
        }
    }
}

/// Outcome of the USD strength regression.
///
/// When `fitted` is false every impact is neutral and the statistics are absent;
/// the event types and their totals are still listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionResult {
    pub fitted: bool,
    pub intercept: Option<Estimate>,
    pub r_squared: Option<f64>,
    pub observations: usize,
    /// One entry per event type in the dataset, sorted by name.
    pub impacts: Vec<EventImpact>,
}

impl RegressionResult {
    fn unfitted(ds: &DerivedDataset) -> Self {
        Self {
            fitted: false,
            intercept: None,
            r_squared: None,
            observations: ds.len(),
            impacts: ds
                .event_types
                .iter()
                .enumerate()
                .map(|(i, t)| EventImpact::neutral(t, ds.total(i)))
                .collect(),
        }
    }

    /// Impacts ordered by |coef| descending, ties by name.
    pub fn ranked(&self) -> Vec<&EventImpact> {
        let mut out: Vec<&EventImpact> = self.impacts.iter().collect();
        out.sort_by(|a, b| {
            b.coef
                .abs()
                .total_cmp(&a.coef.abs())
                .then_with(|| a.event_type.cmp(&b.event_type))
        });
        out
    }

    pub fn impact_of(&self, event_type: &str) -> Option<&EventImpact> {
        self.impacts.iter().find(|i| i.event_type == event_type)
    }
}

/// Fit `usd_strength ~ 1 + counts[type]` over the joined dataset.
///
/// Zero-variance types are left out of the fit and reported neutral. With no
/// types left, too few rows, or linearly dependent columns the result is
/// unfitted.
pub fn fit_usd_strength(ds: &DerivedDataset) -> RegressionResult {
    let varying: Vec<usize> = (0..ds.event_types.len())
        .filter(|&i| {
            let col = &ds.counts[i];
            col.iter().any(|v| *v != col[0])
        })
        .collect();

    if varying.is_empty() {
        tracing::warn!(rows = ds.len(), "no varying event types; regression skipped");
        return RegressionResult::unfitted(ds);
    }
    if ds.len() < varying.len() + 2 {
        tracing::warn!(
            rows = ds.len(),
            predictors = varying.len(),
            "too few joined days for regression"
        );
        return RegressionResult::unfitted(ds);
    }

    let columns: Vec<Vec<f64>> = varying.iter().map(|&i| ds.counts[i].clone()).collect();
    let fit = match ols(&ds.usd_strength, &columns) {
        Some(fit) if !fit.has_aliased() => fit,
        _ => {
            tracing::warn!(
                rows = ds.len(),
                predictors = varying.len(),
                "design matrix is singular; regression skipped"
            );
            return RegressionResult::unfitted(ds);
        }
    };

    let mut result = RegressionResult::unfitted(ds);
    for (slot, &type_idx) in varying.iter().enumerate() {
        if let Some(est) = &fit.coefficients[slot] {
            result.impacts[type_idx] =
                EventImpact::fitted(&ds.event_types[type_idx], ds.total(type_idx), est);
        }
    }
    result.fitted = true;
    result.intercept = Some(fit.intercept);
    result.r_squared = Some(fit.r_squared);

    tracing::info!(
        rows = fit.observations,
        predictors = varying.len(),
        r_squared = fit.r_squared,
        "fitted USD strength regression"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::super::dataset::fixtures::{reference_currencies, reference_events};
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn reference() -> DerivedDataset {
        DerivedDataset::build(&reference_currencies(), &reference_events())
    }

    #[test]
    fn reference_regression() {
        let result = fit_usd_strength(&reference());
        assert!(result.fitted);
        assert!(close(result.intercept.as_ref().unwrap().value, 22.0 / 15.0));
        assert!(close(result.r_squared.unwrap(), 65.0 / 126.0));

        let a = result.impact_of("A").unwrap();
        let b = result.impact_of("B").unwrap();
        assert!(close(a.coef, -11.0 / 18.0));
        assert_eq!(a.impact, Impact::Strengthen);
        assert!(close(b.coef, 7.0 / 18.0));
        assert_eq!(b.impact, Impact::Weaken);
        assert_eq!(a.total_count, 15.0);

        let ranked: Vec<&str> = result.ranked().iter().map(|i| i.event_type.as_str()).collect();
        assert_eq!(ranked, vec!["A", "B"]);
    }

    #[test]
    fn zero_variance_type_is_neutral() {
        let mut ds = reference();
        ds.event_types.push("FLAT".into());
        ds.counts.push(vec![4.0; 5]);

        let result = fit_usd_strength(&ds);
        assert!(result.fitted);
        let flat = result.impact_of("FLAT").unwrap();
        assert_eq!(flat.coef, 0.0);
        assert_eq!(flat.impact, Impact::Neutral);
        assert!(!flat.estimated);
        assert!(close(result.impact_of("A").unwrap().coef, -11.0 / 18.0));
    }

    #[test]
    fn only_zero_variance_types_gives_unfitted() {
        let mut ds = reference();
        ds.counts = vec![vec![1.0; 5], vec![0.0; 5]];
        let result = fit_usd_strength(&ds);
        assert!(!result.fitted);
        assert!(result.impacts.iter().all(|i| i.impact == Impact::Neutral));
        assert_eq!(result.impacts.len(), 2);
    }

    #[test]
    fn collinear_types_give_unfitted() {
        let mut ds = reference();
        let doubled: Vec<f64> = ds.counts[0].iter().map(|v| v * 2.0).collect();
        ds.event_types.push("C".into());
        ds.counts.push(doubled);
        assert!(!fit_usd_strength(&ds).fitted);
    }

    #[test]
    fn empty_dataset_gives_unfitted() {
        let result = fit_usd_strength(&DerivedDataset::default());
        assert!(!result.fitted);
        assert!(result.impacts.is_empty());
    }

    #[test]
    fn too_few_rows_gives_unfitted() {
        let mut ds = reference();
        ds.dates.truncate(3);
        ds.usd_strength.truncate(3);
        for col in &mut ds.counts {
            col.truncate(3);
        }
        assert!(!fit_usd_strength(&ds).fitted);
    }
}

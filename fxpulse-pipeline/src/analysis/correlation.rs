//! Pairwise Pearson correlation of currency percentage changes.

use super::dataset::PctSeries;
use super::stats::pearson;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    /// Row-major, `values[i][j]` for `labels[i]` against `labels[j]`.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        Some(self.values[i][j])
    }
}

/// Correlate every pair of series over the dates both have.
///
/// A pair with fewer than two shared dates, or with no variance on either
/// side, gets 0.0. The diagonal is 1.0 and the lower triangle mirrors the upper.
pub fn correlation_matrix(series: &BTreeMap<String, PctSeries>) -> CorrelationMatrix {
    let labels: Vec<String> = series.keys().cloned().collect();
    let k = labels.len();
    let mut values = vec![vec![0.0; k]; k];

    let columns: Vec<&PctSeries> = series.values().collect();
    for i in 0..k {
        values[i][i] = 1.0;
        for j in (i + 1)..k {
            let (xs, ys): (Vec<f64>, Vec<f64>) = columns[i]
                .iter()
                .filter_map(|(d, x)| columns[j].get(d).map(|y| (*x, *y)))
                .unzip();
            let r = pearson(&xs, &ys).unwrap_or(0.0);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix { labels, values }
}

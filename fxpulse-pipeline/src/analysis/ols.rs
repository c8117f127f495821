//! Ordinary least squares with an intercept, solved by modified Gram-Schmidt QR.
//!
//! A predictor that is (numerically) a linear combination of the intercept and
//! earlier predictors is reported as aliased (`None`) instead of failing the
//! whole fit; callers decide whether that is acceptable.

use super::stats::two_sided_p;
use serde::Serialize;

/// Relative residual norm below which a column counts as aliased.
const ALIAS_TOLERANCE: f64 = 1e-9;

/// One fitted parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub value: f64,
    /// `None` on a perfect fit (zero residual variance).
    pub std_error: Option<f64>,
    pub t_stat: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OlsFit {
    pub intercept: Estimate,
    /// One entry per input column; `None` when the column was aliased.
    pub coefficients: Vec<Option<Estimate>>,
    pub r_squared: f64,
    pub observations: usize,
    pub df_resid: usize,
}

impl OlsFit {
    pub fn has_aliased(&self) -> bool {
        self.coefficients.iter().any(Option::is_none)
    }

    /// Predicted value for one row of predictor values (same column order).
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(row)
            .filter_map(|(c, x)| c.as_ref().map(|c| c.value * x))
            .sum::<f64>()
            + self.intercept.value
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Fit `y ~ 1 + columns`.
///
/// `None` when the columns do not match `y` in length or when fewer than
/// `kept predictors + 2` observations remain (no residual degrees of freedom).
pub fn ols(y: &[f64], columns: &[Vec<f64>]) -> Option<OlsFit> {
    let n = y.len();
    if n == 0 || columns.iter().any(|c| c.len() != n) {
        return None;
    }

    let mut q: Vec<Vec<f64>> = Vec::new();
    // r[k] holds column k of R (length k + 1) for each kept column
    let mut r: Vec<Vec<f64>> = Vec::new();
    // Position of each design column among the kept ones
    let mut kept_at: Vec<Option<usize>> = Vec::with_capacity(columns.len() + 1);

    // Intercept first, then the predictors in order
    for j in 0..=columns.len() {
        let mut v: Vec<f64> = if j == 0 {
            vec![1.0; n]
        } else {
            columns[j - 1].clone()
        };
        let norm0 = dot(&v, &v).sqrt();
        let mut r_col = Vec::with_capacity(q.len() + 1);
        for qi in &q {
            let rij = dot(qi, &v);
            for (vk, qk) in v.iter_mut().zip(qi) {
                *vk -= rij * qk;
            }
            r_col.push(rij);
        }
        let norm = dot(&v, &v).sqrt();
        if norm0 == 0.0 || norm <= ALIAS_TOLERANCE * norm0 {
            kept_at.push(None);
            continue;
        }
        for vk in v.iter_mut() {
            *vk /= norm;
        }
        r_col.push(norm);
        kept_at.push(Some(q.len()));
        q.push(v);
        r.push(r_col);
    }

    let p = q.len();
    // The intercept column can only be dropped when n == 0
    if kept_at[0].is_none() || n < p + 1 {
        return None;
    }
    let df_resid = n - p;

    // R β = Qᵀy
    let qty: Vec<f64> = q.iter().map(|qi| dot(qi, y)).collect();
    let mut beta = vec![0.0; p];
    for i in (0..p).rev() {
        let mut s = qty[i];
        for (k, b) in beta.iter().enumerate().skip(i + 1) {
            s -= r[k][i] * b;
        }
        beta[i] = s / r[i][i];
    }

    // Residuals: y − Q Qᵀy
    let mut resid = y.to_vec();
    for (qi, c) in q.iter().zip(&qty) {
        for (e, qk) in resid.iter_mut().zip(qi) {
            *e -= c * qk;
        }
    }
    let ssr = dot(&resid, &resid);
    let y_mean = y.iter().sum::<f64>() / n as f64;
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { 0.0 };
    let sigma2 = ssr / df_resid as f64;

    // diag((XᵀX)⁻¹) = row norms² of R⁻¹
    let mut r_inv = vec![vec![0.0; p]; p];
    for i in 0..p {
        r_inv[i][i] = 1.0 / r[i][i];
        for j in (i + 1)..p {
            let s: f64 = (i..j).map(|k| r_inv[i][k] * r[j][k]).sum();
            r_inv[i][j] = -s / r[j][j];
        }
    }

    let estimate = |k: usize| {
        let var = r_inv[k][k..].iter().map(|v| v * v).sum::<f64>() * sigma2;
        let se = var.sqrt();
        let value = beta[k];
        if se > 0.0 && se.is_finite() {
            let t = value / se;
            Estimate {
                value,
                std_error: Some(se),
                t_stat: Some(t),
                p_value: Some(two_sided_p(t, df_resid as f64)),
            }
        } else {
            Estimate {
                value,
                std_error: None,
                t_stat: None,
                p_value: None,
            }
        }
    };

    Some(OlsFit {
        intercept: estimate(0),
        coefficients: kept_at[1..].iter().map(|k| k.map(&estimate)).collect(),
        r_squared,
        observations: n,
        df_resid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn reference() -> (Vec<f64>, Vec<Vec<f64>>) {
        (
            vec![2.0, 0.0, 1.0, 1.0, 0.0],
            vec![vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![2.0, 1.0, 4.0, 3.0, 5.0]],
        )
    }

    #[test]
    fn matches_hand_computed_reference() {
        let (y, x) = reference();
        let fit = ols(&y, &x).unwrap();

        assert!(close(fit.intercept.value, 22.0 / 15.0));
        let a = fit.coefficients[0].as_ref().unwrap();
        let b = fit.coefficients[1].as_ref().unwrap();
        assert!(close(a.value, -11.0 / 18.0));
        assert!(close(b.value, 7.0 / 18.0));
        assert!(close(fit.r_squared, 65.0 / 126.0));
        assert_eq!(fit.df_resid, 2);

        assert!(close(fit.intercept.std_error.unwrap(), 0.9018499505645788));
        assert!(close(a.std_error.unwrap(), 0.4339027597725919));
        assert!(close(b.std_error.unwrap(), 0.4339027597725919));
        let p = a.p_value.unwrap();
        assert!(p > 0.0 && p < 1.0);
    }

    #[test]
    fn aliased_column_is_reported_not_fatal() {
        let (y, mut x) = reference();
        // Exact sum of the two predictors
        let sum: Vec<f64> = x[0].iter().zip(&x[1]).map(|(a, b)| a + b).collect();
        x.push(sum);
        let fit = ols(&y, &x).unwrap();
        assert!(fit.has_aliased());
        assert!(fit.coefficients[2].is_none());
        assert!(close(fit.coefficients[0].as_ref().unwrap().value, -11.0 / 18.0));
    }

    #[test]
    fn constant_column_is_aliased_with_intercept() {
        let (y, mut x) = reference();
        x.push(vec![3.0; 5]);
        let fit = ols(&y, &x).unwrap();
        assert!(fit.coefficients[2].is_none());
    }

    #[test]
    fn too_few_observations() {
        let y = vec![1.0, 2.0, 3.0];
        let x = vec![vec![1.0, 0.0, 2.0], vec![0.0, 1.0, 5.0]];
        assert!(ols(&y, &x).is_none());
        assert!(ols(&[], &[]).is_none());
    }

    #[test]
    fn perfect_fit_has_no_standard_errors() {
        let x = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let y: Vec<f64> = x[0].iter().map(|v| 2.0 * v + 1.0).collect();
        let fit = ols(&y, &x).unwrap();
        let slope = fit.coefficients[0].as_ref().unwrap();
        assert!(close(slope.value, 2.0));
        assert!(close(fit.r_squared, 1.0));
        assert!(slope.std_error.is_none() || slope.std_error.unwrap() < 1e-6);
        assert!(close(fit.predict(&[10.0]), 21.0));
    }
}

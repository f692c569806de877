// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Weighted Least Squares
//
// Material-balance straight lines and other linear fits through the normal
// equations. Fitting never fails loudly: singular or malformed data comes back
// as `success: false` so a batch over many tanks or wells keeps going.

use serde::{Deserialize, Serialize};

use crate::distribution::DistributionSpec;
use crate::error::{AnalyticsError, Result};

pub const SINGULAR_MESSAGE: &str = "Data is collinear or insufficient for regression.";

/// Pivot threshold, on the unit-diagonal scaled `XᵗWX`, below which it is
/// treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// RegressionModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionModel {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub covariance_matrix: Vec<Vec<f64>>,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    /// Residual mean square, `RSS / (n - p)`.
    pub mse: f64,
    pub degrees_of_freedom: usize,
    pub observations: usize,
    pub residuals: Vec<f64>,
    pub fitted: Vec<f64>,
}

impl RegressionModel {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            coefficients: Vec::new(),
            std_errors: Vec::new(),
            t_values: Vec::new(),
            covariance_matrix: Vec::new(),
            r_squared: f64::NAN,
            adjusted_r_squared: f64::NAN,
            mse: f64::NAN,
            degrees_of_freedom: 0,
            observations: 0,
            residuals: Vec::new(),
            fitted: Vec::new(),
        }
    }

    /// `row · β`. `None` for a failed model or a row of the wrong width.
    pub fn predict(&self, row: &[f64]) -> Option<f64> {
        if !self.success || row.len() != self.coefficients.len() {
            return None;
        }
        Some(dot(row, &self.coefficients))
    }

    /// Normal distribution centred on coefficient `index` with its standard
    /// error as spread, for feeding a fitted parameter into a Monte Carlo run.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` if the model failed, the index is out of range, or
    /// the standard error is zero (an exact fit carries no uncertainty).
    pub fn coefficient_distribution(&self, index: usize) -> Result<DistributionSpec> {
        if !self.success {
            return Err(AnalyticsError::invalid(
                self.error.clone().unwrap_or_else(|| SINGULAR_MESSAGE.to_string()),
            ));
        }
        let (Some(&mean), Some(&std_err)) =
            (self.coefficients.get(index), self.std_errors.get(index))
        else {
            return Err(AnalyticsError::invalid(format!(
                "coefficient {} out of range ({} fitted)",
                index,
                self.coefficients.len()
            )));
        };
        if !(std_err.is_finite() && std_err > 0.0) {
            return Err(AnalyticsError::invalid(format!(
                "coefficient {} has no usable standard error ({})",
                index, std_err
            )));
        }
        Ok(DistributionSpec::normal(mean, std_err))
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Least squares fit of `y ≈ X·β`, weighted when `weights` is given.
///
/// `x` is row-major: one row per observation, one column per parameter.
/// Include a column of ones for an intercept.
pub fn fit(x: &[Vec<f64>], y: &[f64], weights: Option<&[f64]>) -> RegressionModel {
    match try_fit(x, y, weights) {
        Ok(model) => model,
        Err(message) => {
            tracing::debug!(error = %message, "regression failed");
            RegressionModel::failure(message)
        }
    }
}

/// Straight line `y = a + b·x` (Havlena–Odeh form). Coefficients are `[a, b]`.
pub fn fit_line(x: &[f64], y: &[f64], weights: Option<&[f64]>) -> RegressionModel {
    let design: Vec<Vec<f64>> = x.iter().map(|&xi| vec![1.0, xi]).collect();
    fit(&design, y, weights)
}

/// One observation set in a batch fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
}

/// Fit every dataset; failures stay in place as `success: false` models.
pub fn fit_batch(datasets: &[Dataset]) -> Vec<RegressionModel> {
    datasets
        .iter()
        .map(|d| {
            let model = fit(&d.x, &d.y, d.weights.as_deref());
            if !model.success {
                tracing::warn!(
                    label = %d.label,
                    error = model.error.as_deref().unwrap_or_default(),
                    "regression failed for dataset"
                );
            }
            model
        })
        .collect()
}

fn try_fit(
    x: &[Vec<f64>],
    y: &[f64],
    weights: Option<&[f64]>,
) -> std::result::Result<RegressionModel, String> {
    let n = x.len();
    if n == 0 {
        return Err(SINGULAR_MESSAGE.to_string());
    }
    let p = x[0].len();
    if p == 0 {
        return Err("Design matrix has no columns.".to_string());
    }
    if let Some(i) = x.iter().position(|row| row.len() != p) {
        return Err(format!("Row {} has {} columns, expected {}.", i, x[i].len(), p));
    }
    if y.len() != n {
        return Err(format!("Expected {} observations in y, got {}.", n, y.len()));
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err("Observations must be finite.".to_string());
    }
    let w: Vec<f64> = match weights {
        Some(w) if w.len() != n => {
            return Err(format!("Expected {} weights, got {}.", n, w.len()));
        }
        Some(w) if w.iter().any(|v| !v.is_finite() || *v < 0.0) => {
            return Err("Weights must be finite and non-negative.".to_string());
        }
        Some(w) => w.to_vec(),
        None => vec![1.0; n],
    };
    if n <= p {
        return Err(SINGULAR_MESSAGE.to_string());
    }

    // XᵗWX and XᵗWy
    let mut xtwx = vec![vec![0.0; p]; p];
    let mut xtwy = vec![0.0; p];
    for ((row, &yi), &wi) in x.iter().zip(y).zip(&w) {
        for j in 0..p {
            let wxj = wi * row[j];
            xtwy[j] += wxj * yi;
            for k in 0..p {
                xtwx[j][k] += wxj * row[k];
            }
        }
    }

    let inverse = invert(&xtwx).ok_or_else(|| SINGULAR_MESSAGE.to_string())?;
    let beta: Vec<f64> = inverse.iter().map(|row| dot(row, &xtwy)).collect();

    let fitted: Vec<f64> = x.iter().map(|row| dot(row, &beta)).collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();

    let w_sum: f64 = w.iter().sum();
    if w_sum <= 0.0 {
        return Err(SINGULAR_MESSAGE.to_string());
    }
    let y_bar = y.iter().zip(&w).map(|(yi, wi)| wi * yi).sum::<f64>() / w_sum;
    let rss: f64 = residuals.iter().zip(&w).map(|(r, wi)| wi * r * r).sum();
    let tss: f64 = y.iter().zip(&w).map(|(yi, wi)| wi * (yi - y_bar).powi(2)).sum();

    let dof = n - p;
    let mse = rss / dof as f64;
    let covariance: Vec<Vec<f64>> = inverse
        .iter()
        .map(|row| row.iter().map(|v| mse * v).collect())
        .collect();
    let std_errors: Vec<f64> = (0..p).map(|i| covariance[i][i].max(0.0).sqrt()).collect();
    let t_values = beta
        .iter()
        .zip(&std_errors)
        .map(|(b, se)| if *se > 0.0 { b / se } else { f64::INFINITY.copysign(*b) })
        .collect();

    let r_squared = if tss > 0.0 {
        1.0 - rss / tss
    } else if rss <= f64::EPSILON {
        1.0
    } else {
        0.0
    };
    let adjusted_r_squared = if n > 1 {
        1.0 - (1.0 - r_squared) * (n - 1) as f64 / dof as f64
    } else {
        r_squared
    };

    Ok(RegressionModel {
        success: true,
        error: None,
        coefficients: beta,
        std_errors,
        t_values,
        covariance_matrix: covariance,
        r_squared,
        adjusted_r_squared,
        mse,
        degrees_of_freedom: dof,
        observations: n,
        residuals,
        fitted,
    })
}

/// Inverse of a Gram matrix by Gauss–Jordan with partial pivoting. `None`
/// when singular.
///
/// The matrix is first Jacobi-scaled to unit diagonal (`S = D⁻¹AD⁻¹`,
/// `D = sqrt(diag A)`) so the singularity test does not depend on the units
/// of each column; the inverse is unscaled as `A⁻¹ = D⁻¹S⁻¹D⁻¹`.
fn invert(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut d = Vec::with_capacity(n);
    for (i, row) in a.iter().enumerate() {
        let diag = row[i];
        if !(diag.is_finite() && diag > 0.0) {
            return None;
        }
        d.push(diag.sqrt());
    }
    let scaled: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| row.iter().enumerate().map(|(j, v)| v / (d[i] * d[j])).collect())
        .collect();

    let inverse = gauss_jordan(&scaled)?;
    Some(
        inverse
            .into_iter()
            .enumerate()
            .map(|(i, row)| row.into_iter().enumerate().map(|(j, v)| v / (d[i] * d[j])).collect())
            .collect(),
    )
}

/// Unit-diagonal input, so the pivot tolerance is absolute.
fn gauss_jordan(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();

    // Augmented [A | I]
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))?;
        if m[pivot_row][col].abs() <= SINGULAR_TOLERANCE {
            return None;
        }
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        for v in m[col].iter_mut() {
            *v /= pivot;
        }
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = m[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..2 * n {
                m[r][c] -= factor * m[col][c];
            }
        }
    }

    Some(m.into_iter().map(|row| row[n..].to_vec()).collect())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ===========================================================================
// Tests
// ===========================================================================

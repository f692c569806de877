// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Correlated Multivariate Sampling
//
// Imposes a target correlation structure on independent standard normal draws
// through the lower Cholesky factor of the covariance matrix: x = means + L·z.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::random::{self, DefaultRng};

/// Structural tolerance for unit diagonal and symmetry checks.
const STRUCTURE_TOLERANCE: f64 = 1e-9;

/// Negative pivots down to `-PIVOT_TOLERANCE * scale` are PSD round-off and are
/// clamped without a warning.
const PIVOT_TOLERANCE: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What to do when the Cholesky recurrence meets a negative pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CorrelationPolicy {
    /// Clamp the pivot to zero, flag it on the result and keep sampling.
    #[default]
    Clamp,
    /// Fail with `NonPositiveDefinite`.
    Strict,
}

// ---------------------------------------------------------------------------
// CorrelationMatrix
// ---------------------------------------------------------------------------

/// Square, symmetric, unit-diagonal correlation matrix.
///
/// Structure is validated on construction. Positive semi-definiteness is only
/// known once the Cholesky factor is computed, see [`CholeskyFactor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct CorrelationMatrix {
    rows: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// # Errors
    ///
    /// `InvalidCorrelation` when the matrix is empty, ragged, non-finite,
    /// asymmetric, has a diagonal other than 1 or an entry outside [-1, 1].
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(AnalyticsError::InvalidCorrelation("matrix is empty".into()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(AnalyticsError::InvalidCorrelation(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(AnalyticsError::InvalidCorrelation(format!(
                    "entry ({}, {}) is not finite",
                    i, j
                )));
            }
            if (row[i] - 1.0).abs() > STRUCTURE_TOLERANCE {
                return Err(AnalyticsError::InvalidCorrelation(format!(
                    "diagonal entry {} is {}, expected 1",
                    i, row[i]
                )));
            }
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (rows[i][j], rows[j][i]);
                if (a - b).abs() > STRUCTURE_TOLERANCE {
                    return Err(AnalyticsError::InvalidCorrelation(format!(
                        "not symmetric at ({}, {}): {} vs {}",
                        i, j, a, b
                    )));
                }
                if a.abs() > 1.0 + STRUCTURE_TOLERANCE {
                    return Err(AnalyticsError::InvalidCorrelation(format!(
                        "entry ({}, {}) = {} is outside [-1, 1]",
                        i, j, a
                    )));
                }
            }
        }
        Ok(Self { rows })
    }

    /// No correlation between any pair.
    pub fn identity(dim: usize) -> Self {
        let rows = (0..dim)
            .map(|i| (0..dim).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        Self { rows }
    }

    /// Two-variable matrix with correlation `rho`.
    pub fn pair(rho: f64) -> Result<Self> {
        Self::new(vec![vec![1.0, rho], vec![rho, 1.0]])
    }

    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.rows[i][j]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// `Σ[i][j] = ρ[i][j]·σ[i]·σ[j]`.
    pub fn covariance(&self, std_devs: &[f64]) -> Result<Vec<Vec<f64>>> {
        check_len(self.dim(), std_devs.len())?;
        Ok(self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, rho)| rho * std_devs[i] * std_devs[j])
                    .collect()
            })
            .collect())
    }
}

impl TryFrom<Vec<Vec<f64>>> for CorrelationMatrix {
    type Error = AnalyticsError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<CorrelationMatrix> for Vec<Vec<f64>> {
    fn from(m: CorrelationMatrix) -> Self {
        m.rows
    }
}

// ---------------------------------------------------------------------------
// CholeskyFactor
// ---------------------------------------------------------------------------

/// Lower-triangular `L` with `L·Lᵗ = Σ`.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    lower: Vec<Vec<f64>>,
    clamped_pivots: Vec<usize>,
}

impl CholeskyFactor {
    /// Factor a symmetric matrix with the standard in-place recurrence.
    ///
    /// A diagonal term that would need the square root of a negative number is
    /// clamped to zero and recorded in [`clamped_pivots`](Self::clamped_pivots)
    /// under [`CorrelationPolicy::Clamp`], or rejected with
    /// `NonPositiveDefinite` under [`CorrelationPolicy::Strict`].
    ///
    /// # Errors
    ///
    /// `InvalidCorrelation` for an empty matrix or non-finite entries,
    /// `DimensionMismatch` for a row whose length is not the row count.
    pub fn decompose(matrix: &[Vec<f64>], policy: CorrelationPolicy) -> Result<Self> {
        let n = matrix.len();
        if n == 0 {
            return Err(AnalyticsError::InvalidCorrelation("matrix is empty".into()));
        }
        for row in matrix {
            check_len(n, row.len())?;
        }
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::InvalidCorrelation("matrix has non-finite entries".into()));
        }
        let scale = (0..n).map(|i| matrix[i][i].abs()).fold(0.0_f64, f64::max);
        let tolerance = PIVOT_TOLERANCE * scale.max(f64::MIN_POSITIVE);

        let mut lower = vec![vec![0.0; n]; n];
        let mut clamped_pivots = Vec::new();

        for i in 0..n {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();
                if i == j {
                    let pivot = matrix[i][i] - sum;
                    if pivot < -tolerance {
                        if policy == CorrelationPolicy::Strict {
                            return Err(AnalyticsError::NonPositiveDefinite {
                                pivot: i,
                                value: pivot,
                            });
                        }
                        clamped_pivots.push(i);
                    }
                    lower[i][i] = pivot.max(0.0).sqrt();
                } else if lower[j][j] > 0.0 {
                    lower[i][j] = (matrix[i][j] - sum) / lower[j][j];
                }
            }
        }

        Ok(Self { lower, clamped_pivots })
    }

    pub fn lower(&self) -> &[Vec<f64>] {
        &self.lower
    }

    /// Indices of diagonal terms that were clamped from a negative value.
    pub fn clamped_pivots(&self) -> &[usize] {
        &self.clamped_pivots
    }

    pub fn is_clamped(&self) -> bool {
        !self.clamped_pivots.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// `L·z`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` unless `z` has one entry per variable.
    pub fn transform(&self, z: &[f64]) -> Result<Vec<f64>> {
        check_len(self.dim(), z.len())?;
        Ok(self
            .lower
            .iter()
            .map(|row| row.iter().zip(z).map(|(l, z)| l * z).sum())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Output of a correlated generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedSamples {
    /// One vector per draw, one entry per variable.
    pub samples: Vec<Vec<f64>>,
    /// Cholesky pivots clamped from negative values (empty when the matrix
    /// was positive semi-definite).
    pub clamped_pivots: Vec<usize>,
}

impl CorrelatedSamples {
    pub fn has_warning(&self) -> bool {
        !self.clamped_pivots.is_empty()
    }

    /// Column `var` across all draws.
    pub fn column(&self, var: usize) -> Vec<f64> {
        self.samples.iter().map(|s| s[var]).collect()
    }
}

/// Generate `n_samples` vectors `means + L·z` from `rng`.
pub fn generate_with<R: Rng + ?Sized>(
    rng: &mut R,
    means: &[f64],
    std_devs: &[f64],
    correlation: &CorrelationMatrix,
    n_samples: usize,
    policy: CorrelationPolicy,
) -> Result<CorrelatedSamples> {
    let dim = correlation.dim();
    check_len(dim, means.len())?;
    check_len(dim, std_devs.len())?;
    if means.iter().any(|m| !m.is_finite()) {
        return Err(AnalyticsError::invalid("means must be finite"));
    }
    if std_devs.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(AnalyticsError::invalid("stdDevs must be finite and non-negative"));
    }

    let covariance = correlation.covariance(std_devs)?;
    let factor = CholeskyFactor::decompose(&covariance, policy)?;
    if factor.is_clamped() {
        tracing::warn!(
            pivots = ?factor.clamped_pivots(),
            "correlation matrix is not positive definite; clamped pivots to zero"
        );
    }

    let mut samples = Vec::with_capacity(n_samples);
    let mut z = vec![0.0; dim];
    for _ in 0..n_samples {
        for zi in z.iter_mut() {
            *zi = random::standard_normal(rng);
        }
        let offsets = factor.transform(&z)?;
        samples.push(means.iter().zip(offsets).map(|(m, o)| m + o).collect());
    }

    Ok(CorrelatedSamples { samples, clamped_pivots: factor.clamped_pivots })
}

/// Correlated sampler over an injected random source.
pub struct CorrelatedSampler<R> {
    rng: R,
    policy: CorrelationPolicy,
}

impl CorrelatedSampler<DefaultRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(random::create_rng(seed))
    }
}

impl<R: Rng> CorrelatedSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, policy: CorrelationPolicy::default() }
    }

    pub fn with_policy(mut self, policy: CorrelationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CorrelationPolicy {
        self.policy
    }

    pub fn generate(
        &mut self,
        means: &[f64],
        std_devs: &[f64],
        correlation: &CorrelationMatrix,
        n_samples: usize,
    ) -> Result<CorrelatedSamples> {
        generate_with(&mut self.rng, means, std_devs, correlation, n_samples, self.policy)
    }

    /// Correlated standard normals (zero means, unit standard deviations).
    pub fn generate_standard(
        &mut self,
        correlation: &CorrelationMatrix,
        n_samples: usize,
    ) -> Result<CorrelatedSamples> {
        let dim = correlation.dim();
        self.generate(&vec![0.0; dim], &vec![1.0; dim], correlation, n_samples)
    }
}

fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(AnalyticsError::DimensionMismatch { expected, got });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

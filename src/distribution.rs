// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Distribution Sampling
//
// Input distributions arrive from the host as a loosely-typed spec (a type tag
// plus a parameter map, straight from form values). They are validated once
// into a typed `Distribution` and sampled from an injected generator.

use std::collections::BTreeMap;
use std::f64::consts::SQRT_2;

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

use crate::error::{AnalyticsError, Result};
use crate::random::{self, DefaultRng};

// ─── Spec (wire form) ───────────────────────────────────────────────────────

/// Distribution specification as supplied by the caller.
///
/// `type` is one of `Normal`, `Lognormal`, `Triangular`, `Uniform`
/// (case-insensitive). Parameters use the keys `mean`, `stdDev`, `min`,
/// `mode` and `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    #[serde(rename = "type")]
    pub dist_type: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl DistributionSpec {
    pub fn new(dist_type: impl Into<String>, parameters: &[(&str, f64)]) -> Self {
        Self {
            dist_type: dist_type.into(),
            parameters: parameters.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Self::new("Normal", &[("mean", mean), ("stdDev", std_dev)])
    }

    pub fn lognormal(mean: f64, std_dev: f64) -> Self {
        Self::new("Lognormal", &[("mean", mean), ("stdDev", std_dev)])
    }

    pub fn triangular(min: f64, mode: f64, max: f64) -> Self {
        Self::new("Triangular", &[("min", min), ("mode", mode), ("max", max)])
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Self::new("Uniform", &[("min", min), ("max", max)])
    }

    fn param(&self, key: &str) -> Result<f64> {
        let value = self.parameters.get(key).copied().ok_or_else(|| {
            AnalyticsError::invalid(format!(
                "{} distribution requires parameter '{}'",
                self.dist_type, key
            ))
        })?;
        if !value.is_finite() {
            return Err(AnalyticsError::invalid(format!(
                "parameter '{}' must be finite, got {}",
                key, value
            )));
        }
        Ok(value)
    }
}

// ─── Typed distribution ─────────────────────────────────────────────────────

/// Validated distribution, ready to sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    Normal { mean: f64, std_dev: f64 },
    /// Parameterized by the target (arithmetic) mean and standard deviation;
    /// `mu`/`sigma` describe the underlying normal.
    Lognormal { mean: f64, std_dev: f64, mu: f64, sigma: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
    Uniform { min: f64, max: f64 },
}

impl Distribution {
    /// Validate a caller spec.
    ///
    /// # Errors
    ///
    /// `UnsupportedDistribution` for an unknown type tag, `InvalidParameters`
    /// for missing, non-finite or out-of-range parameters.
    pub fn from_spec(spec: &DistributionSpec) -> Result<Self> {
        let tag: String = spec
            .dist_type
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match tag.as_str() {
            "normal" => {
                let mean = spec.param("mean")?;
                let std_dev = positive_std_dev(spec)?;
                Ok(Self::Normal { mean, std_dev })
            }
            "lognormal" => {
                let mean = spec.param("mean")?;
                let std_dev = positive_std_dev(spec)?;
                if mean <= 0.0 {
                    return Err(AnalyticsError::invalid(format!(
                        "Lognormal mean must be positive, got {}",
                        mean
                    )));
                }
                let sigma2 = (1.0 + (std_dev * std_dev) / (mean * mean)).ln();
                let mu = mean.ln() - sigma2 / 2.0;
                Ok(Self::Lognormal { mean, std_dev, mu, sigma: sigma2.sqrt() })
            }
            "triangular" => {
                let min = spec.param("min")?;
                let mode = spec.param("mode")?;
                let max = spec.param("max")?;
                if !(min <= mode && mode <= max) {
                    return Err(AnalyticsError::invalid(format!(
                        "Triangular requires min <= mode <= max, got {} / {} / {}",
                        min, mode, max
                    )));
                }
                Ok(Self::Triangular { min, mode, max })
            }
            "uniform" => {
                let min = spec.param("min")?;
                let max = spec.param("max")?;
                if min >= max {
                    return Err(AnalyticsError::invalid(format!(
                        "Uniform requires min < max, got {} / {}",
                        min, max
                    )));
                }
                Ok(Self::Uniform { min, max })
            }
            _ => Err(AnalyticsError::UnsupportedDistribution(spec.dist_type.clone())),
        }
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Normal { mean, std_dev } => mean + std_dev * random::standard_normal(rng),
            Self::Lognormal { mu, sigma, .. } => (mu + sigma * random::standard_normal(rng)).exp(),
            Self::Triangular { .. } | Self::Uniform { .. } => {
                let u: f64 = rng.gen();
                self.inverse_cdf(u)
            }
        }
    }

    /// Map a standard normal draw onto this marginal.
    ///
    /// Normal and Lognormal are affine/exponential in `z`. Triangular and
    /// Uniform go through `u = Φ(z)` and the inverse CDF, which keeps the
    /// rank correlation imposed on `z`.
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        match *self {
            Self::Normal { mean, std_dev } => mean + std_dev * z,
            Self::Lognormal { mu, sigma, .. } => (mu + sigma * z).exp(),
            Self::Triangular { .. } | Self::Uniform { .. } => {
                let u = (0.5 * erfc(-z / SQRT_2)).clamp(0.0, 1.0);
                self.inverse_cdf(u)
            }
        }
    }

    fn inverse_cdf(&self, u: f64) -> f64 {
        match *self {
            Self::Triangular { min, mode, max } => {
                let range = max - min;
                if range <= 0.0 {
                    return min;
                }
                let f = (mode - min) / range;
                if u <= f {
                    min + (u * range * (mode - min)).sqrt()
                } else {
                    max - ((1.0 - u) * range * (max - mode)).sqrt()
                }
            }
            Self::Uniform { min, max } => min + u * (max - min),
            // Normal families are sampled in closed form and never get here.
            Self::Normal { .. } | Self::Lognormal { .. } => f64::NAN,
        }
    }

    /// Analytic mean.
    pub fn mean(&self) -> f64 {
        match *self {
            Self::Normal { mean, .. } | Self::Lognormal { mean, .. } => mean,
            Self::Triangular { min, mode, max } => (min + mode + max) / 3.0,
            Self::Uniform { min, max } => (min + max) / 2.0,
        }
    }

    /// Analytic variance.
    pub fn variance(&self) -> f64 {
        match *self {
            Self::Normal { std_dev, .. } | Self::Lognormal { std_dev, .. } => std_dev * std_dev,
            Self::Triangular { min: a, mode: c, max: b } => {
                (a * a + b * b + c * c - a * b - a * c - b * c) / 18.0
            }
            Self::Uniform { min, max } => (max - min).powi(2) / 12.0,
        }
    }
}

impl TryFrom<&DistributionSpec> for Distribution {
    type Error = AnalyticsError;

    fn try_from(spec: &DistributionSpec) -> Result<Self> {
        Self::from_spec(spec)
    }
}

fn positive_std_dev(spec: &DistributionSpec) -> Result<f64> {
    let std_dev = spec.param("stdDev")?;
    if std_dev <= 0.0 {
        return Err(AnalyticsError::invalid(format!(
            "{} stdDev must be positive, got {}",
            spec.dist_type, std_dev
        )));
    }
    Ok(std_dev)
}

// ─── Sampler ────────────────────────────────────────────────────────────────

/// Single-value sampler over an injected random source.
pub struct DistributionSampler<R> {
    rng: R,
}

impl DistributionSampler<DefaultRng> {
    /// Sampler over the default ChaCha8 generator.
    pub fn seeded(seed: u64) -> Self {
        Self::new(random::create_rng(seed))
    }
}

impl<R: Rng> DistributionSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Validate `spec` and draw one value from it.
    pub fn sample(&mut self, spec: &DistributionSpec) -> Result<f64> {
        let dist = Distribution::from_spec(spec)?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Validate `spec` once and draw `n` values.
    pub fn sample_n(&mut self, spec: &DistributionSpec, n: usize) -> Result<Vec<f64>> {
        let dist = Distribution::from_spec(spec)?;
        Ok((0..n).map(|_| dist.sample(&mut self.rng)).collect())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Engine Configuration

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationPolicy;
use crate::error::{AnalyticsError, Result};
use crate::outliers::DEFAULT_Z_THRESHOLD;
use crate::statistics::DEFAULT_HISTOGRAM_BINS;

pub const DEFAULT_ITERATIONS: usize = 10_000;

/// Tunables for a Monte Carlo / analytics session.
///
/// Missing JSON fields take their defaults, so hosts only send what the user
/// changed on the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Trials per Monte Carlo run.
    pub iterations: usize,
    pub histogram_bins: usize,
    pub correlation_policy: CorrelationPolicy,
    /// Evaluate trials on the rayon pool (native targets only).
    pub parallel: bool,
    pub outlier_threshold: f64,
    /// Seed for the default generator; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            correlation_policy: CorrelationPolicy::Clamp,
            parallel: false,
            outlier_threshold: DEFAULT_Z_THRESHOLD,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config object.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(AnalyticsError::Config("iterations must be positive".into()));
        }
        if self.histogram_bins == 0 {
            return Err(AnalyticsError::Config("histogramBins must be positive".into()));
        }
        if !(self.outlier_threshold.is_finite() && self.outlier_threshold > 0.0) {
            return Err(AnalyticsError::Config(format!(
                "outlierThreshold must be a positive number, got {}",
                self.outlier_threshold
            )));
        }
        Ok(())
    }
}

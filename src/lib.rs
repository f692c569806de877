// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine
//
// Probabilistic reserves estimation for a browser-hosted petroleum engineering
// tool: seeded Monte Carlo over user-defined input distributions (optionally
// correlated), P90/P50/P10 summaries, weighted least squares for material
// balance straight lines, and z-score screening of observation data.

pub mod config;
pub mod correlation;
pub mod distribution;
pub mod error;
pub mod monte_carlo;
pub mod outliers;
pub mod random;
pub mod regression;
pub mod statistics;

pub use config::EngineConfig;
pub use correlation::{
    CholeskyFactor, CorrelatedSampler, CorrelatedSamples, CorrelationMatrix, CorrelationPolicy,
};
pub use distribution::{Distribution, DistributionSampler, DistributionSpec};
pub use error::{AnalyticsError, ErrorKind, ModelError, Result};
pub use monte_carlo::{
    InputVariable, ModelResult, MonteCarloEngine, OutcomeModel, SimulationResult, TrialParams,
};
pub use outliers::{detect_residual_outliers, Outlier};
pub use regression::{fit_line, RegressionModel};
pub use statistics::{summarize, Summary};

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::random::create_rng;

// ─── WASM Interface ──────────────────────────────────────────────────────────
//
// Plain objects in, plain objects out. Each export deserializes a request,
// runs the Rust call and serializes the result; errors cross as strings.

fn install_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn to_js<T: Serialize>(value: &T) -> std::result::Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: for<'de> Deserialize<'de>>(value: JsValue) -> std::result::Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_err(err: AnalyticsError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeRequest {
    values: Vec<f64>,
    #[serde(default)]
    bins: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegressionRequest {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
    #[serde(default)]
    weights: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlierRequest {
    series: Vec<f64>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    config: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CorrelatedRequest {
    means: Vec<f64>,
    std_devs: Vec<f64>,
    correlation: CorrelationMatrix,
    n_samples: usize,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    policy: CorrelationPolicy,
}

impl SummarizeRequest {
    fn run(&self) -> Result<Summary> {
        summarize(&self.values, self.bins.unwrap_or(statistics::DEFAULT_HISTOGRAM_BINS))
    }
}

impl RegressionRequest {
    fn run(&self) -> RegressionModel {
        regression::fit(&self.x, &self.y, self.weights.as_deref())
    }
}

impl OutlierRequest {
    fn run(&self) -> Result<Vec<Outlier>> {
        self.config.validate()?;
        Ok(match self.threshold {
            Some(threshold) => outliers::detect(&self.series, threshold),
            None => outliers::detect_configured(&self.series, &self.config),
        })
    }
}

impl CorrelatedRequest {
    fn run(&self) -> Result<CorrelatedSamples> {
        let mut rng = match self.seed {
            Some(seed) => create_rng(seed),
            None => {
                use rand::SeedableRng;
                random::DefaultRng::from_entropy()
            }
        };
        correlation::generate_with(
            &mut rng,
            &self.means,
            &self.std_devs,
            &self.correlation,
            self.n_samples,
            self.policy,
        )
    }
}

/// `{ values, bins? }` → `Summary`
#[wasm_bindgen(js_name = summarize)]
pub fn summarize_js(request: JsValue) -> std::result::Result<JsValue, JsValue> {
    install_panic_hook();
    let request: SummarizeRequest = from_js(request)?;
    to_js(&request.run().map_err(js_err)?)
}

/// `{ x, y, weights? }` → `RegressionModel`. Never throws on bad data; check
/// `success`.
#[wasm_bindgen(js_name = fitRegression)]
pub fn fit_regression_js(request: JsValue) -> std::result::Result<JsValue, JsValue> {
    install_panic_hook();
    let request: RegressionRequest = from_js(request)?;
    to_js(&request.run())
}

/// `{ series, threshold?, config? }` → `Outlier[]`. Without `threshold` the
/// config's `outlierThreshold` applies.
#[wasm_bindgen(js_name = detectOutliers)]
pub fn detect_outliers_js(request: JsValue) -> std::result::Result<JsValue, JsValue> {
    install_panic_hook();
    let request: OutlierRequest = from_js(request)?;
    to_js(&request.run().map_err(js_err)?)
}

/// `{ means, stdDevs, correlation, nSamples, seed?, policy? }` →
/// `CorrelatedSamples`
#[wasm_bindgen(js_name = generateCorrelated)]
pub fn generate_correlated_js(request: JsValue) -> std::result::Result<JsValue, JsValue> {
    install_panic_hook();
    let request: CorrelatedRequest = from_js(request)?;
    to_js(&request.run().map_err(js_err)?)
}

// ===========================================================================
// Tests
// ===========================================================================

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Z-Score Outlier Detection

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::regression::RegressionModel;

pub const DEFAULT_Z_THRESHOLD: f64 = 2.5;

/// Shortest series worth screening; below this a single point dominates the
/// moments and every z-score is meaningless.
pub const MIN_SERIES_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outlier {
    /// Position in the original series.
    pub index: usize,
    pub value: f64,
    /// `|value - mean| / std_dev`
    pub z_score: f64,
}

/// Flag points whose absolute population z-score exceeds `threshold`.
///
/// NaN and infinite entries are skipped, both for the moments and as
/// candidates, but indices still refer to the original series. Returns an
/// empty list when fewer than [`MIN_SERIES_LEN`] finite points remain or the
/// series is constant.
pub fn detect(series: &[f64], threshold: f64) -> Vec<Outlier> {
    let finite: Vec<(usize, f64)> = series
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .collect();
    if finite.len() < MIN_SERIES_LEN {
        return Vec::new();
    }

    let n = finite.len() as f64;
    let mean = finite.iter().map(|(_, v)| v).sum::<f64>() / n;
    let variance = finite.iter().map(|(_, v)| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 || !std_dev.is_finite() {
        return Vec::new();
    }

    let outliers: Vec<Outlier> = finite
        .into_iter()
        .filter_map(|(index, value)| {
            let z_score = (value - mean).abs() / std_dev;
            (z_score > threshold).then_some(Outlier { index, value, z_score })
        })
        .collect();

    if !outliers.is_empty() {
        tracing::debug!(count = outliers.len(), threshold, "outliers flagged");
    }
    outliers
}

/// [`detect`] at the session's `outlier_threshold`.
pub fn detect_configured(series: &[f64], config: &EngineConfig) -> Vec<Outlier> {
    detect(series, config.outlier_threshold)
}

/// Screen a fitted model's residuals. A failed model has none to screen.
pub fn detect_residual_outliers(model: &RegressionModel, threshold: f64) -> Vec<Outlier> {
    if !model.success {
        return Vec::new();
    }
    detect(&model.residuals, threshold)
}

// ===========================================================================
// Tests
// ===========================================================================

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Statistics Aggregation
//
// Percentiles follow the oilfield exceedance convention: P90 is the small,
// conservative value (90% chance of meeting or exceeding it), P10 the large,
// optimistic one.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// z for a two-sided 95% confidence interval on the mean.
const Z_95: f64 = 1.96;

// ─── Histogram ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub bin_width: f64,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Partition `[min, max]` into `bins` equal-width buckets.
    ///
    /// Each value lands in `floor((v - min) / width)`, clamped to the last
    /// bucket so `max` itself is counted. A zero-width range puts everything in
    /// the first bucket.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` for `bins == 0` or a non-finite or inverted range.
    pub fn build(values: &[f64], min: f64, max: f64, bins: usize) -> Result<Self> {
        if bins == 0 {
            return Err(AnalyticsError::invalid("histogram needs at least one bin"));
        }
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(AnalyticsError::invalid(format!(
                "histogram range must be finite with min <= max, got [{}, {}]",
                min, max
            )));
        }
        let bin_width = (max - min) / bins as f64;
        let mut counts = vec![0usize; bins];
        for &v in values {
            let idx = if bin_width > 0.0 {
                (((v - min) / bin_width).floor().max(0.0) as usize).min(bins - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }
        let bins = counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: min + i as f64 * bin_width,
                upper: if i + 1 == bins { max } else { min + (i + 1) as f64 * bin_width },
                count,
            })
            .collect();
        Ok(Self { bin_width, bins })
    }

    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

// ─── Summary ────────────────────────────────────────────────────────────────

/// Percentile and moment summary of a numeric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
    pub mean: f64,
    /// Sample standard deviation (n - 1); zero for a single value.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub n: usize,
    pub histogram: Histogram,
}

/// Summarize `values` into P90/P50/P10, moments and a histogram.
///
/// The input slice is not modified; a sorted copy is taken.
///
/// # Errors
///
/// `EmptySeries` for no values, `NonFiniteValue` if any value is NaN or
/// infinite, `InvalidParameters` for `bins == 0`.
pub fn summarize(values: &[f64], bins: usize) -> Result<Summary> {
    if values.is_empty() {
        return Err(AnalyticsError::EmptySeries);
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(AnalyticsError::NonFiniteValue { index });
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let min = sorted[0];
    let max = sorted[n - 1];
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let std_dev = sample_std_dev(&sorted, mean);
    let stderr = std_dev / (n as f64).sqrt();

    Ok(Summary {
        p90: percentile_exceedance(&sorted, 90.0),
        p50: percentile_exceedance(&sorted, 50.0),
        p10: percentile_exceedance(&sorted, 10.0),
        mean,
        std_dev,
        min,
        max,
        ci_lower: mean - Z_95 * stderr,
        ci_upper: mean + Z_95 * stderr,
        n,
        histogram: Histogram::build(&sorted, min, max, bins)?,
    })
}

/// Value exceeded with probability `percent`% in an ascending, non-empty
/// slice: `percentile_exceedance(sorted, 90.0)` is P90.
pub fn percentile_exceedance(sorted: &[f64], percent: f64) -> f64 {
    floor_quantile(sorted, (100.0 - percent) / 100.0)
}

/// `sorted[floor(q·n)]` for an ascending, non-empty slice.
///
/// `q` is the non-exceedance fraction: P90 is `q = 0.10`, P10 is `q = 0.90`.
pub fn floor_quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    let idx = ((q.clamp(0.0, 1.0) * n as f64).floor() as usize).min(n - 1);
    sorted[idx]
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (n denominator).
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Pearson product-moment correlation.
///
/// `None` when lengths differ, fewer than two pairs, or either series is
/// constant.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let ma = mean(a)?;
    let mb = mean(b)?;
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return None;
    }
    Some(sab / (saa.sqrt() * sbb.sqrt()))
}

fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

// ===========================================================================
// Tests
// ===========================================================================

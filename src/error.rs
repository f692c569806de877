// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Error Taxonomy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Discriminant for [`AnalyticsError`], stable across the JS boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidParameters,
    UnsupportedDistribution,
    NonPositiveDefinite,
    InvalidCorrelation,
    DimensionMismatch,
    EmptySeries,
    NonFiniteValue,
    NoValidTrials,
    Config,
}

impl ErrorKind {
    /// `true` for errors caused by the caller's configuration, `false` for
    /// errors caused by the data itself (nothing usable to aggregate).
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::EmptySeries | Self::NonFiniteValue | Self::NoValidTrials)
    }
}

// ---------------------------------------------------------------------------
// AnalyticsError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("unsupported distribution type '{0}'")]
    UnsupportedDistribution(String),

    #[error("correlation matrix is not positive definite (pivot {pivot} = {value:.6e})")]
    NonPositiveDefinite { pivot: usize, value: f64 },

    #[error("invalid correlation matrix: {0}")]
    InvalidCorrelation(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("cannot summarize an empty series")]
    EmptySeries,

    #[error("non-finite value at index {index}")]
    NonFiniteValue { index: usize },

    #[error("no valid trials out of {requested} requested")]
    NoValidTrials { requested: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

impl AnalyticsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::UnsupportedDistribution(_) => ErrorKind::UnsupportedDistribution,
            Self::NonPositiveDefinite { .. } => ErrorKind::NonPositiveDefinite,
            Self::InvalidCorrelation(_) => ErrorKind::InvalidCorrelation,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::EmptySeries => ErrorKind::EmptySeries,
            Self::NonFiniteValue { .. } => ErrorKind::NonFiniteValue,
            Self::NoValidTrials { .. } => ErrorKind::NoValidTrials,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Error returned by a Monte Carlo model function for a single trial.
///
/// A trial that fails this way is discarded; the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model evaluation failed: {0}")]
pub struct ModelError(pub String);

impl ModelError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

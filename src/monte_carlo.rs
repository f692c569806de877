// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Reserves Analytics Engine - Monte Carlo Engine
//
// N trials of sampler -> model function -> aggregate. Inputs for every trial
// are drawn up front from the injected generator, so a seed fixes the run
// regardless of how the model evaluations are scheduled. Trials whose model
// fails or returns a non-finite value are discarded one by one; only a run
// with no surviving trial is an error.

use std::collections::{BTreeMap, HashSet};

use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::correlation::{self, CorrelationMatrix};
use crate::distribution::{Distribution, DistributionSpec};
use crate::error::{AnalyticsError, ModelError, Result};
use crate::random::{self, DefaultRng};
use crate::statistics::{self, Summary};

/// Sampled inputs for one trial, keyed by variable name.
pub type TrialParams = BTreeMap<String, f64>;

/// What a model function returns for one trial.
pub type ModelResult = std::result::Result<f64, ModelError>;

// ─── Model seam ─────────────────────────────────────────────────────────────

/// Deterministic physical model evaluated once per trial.
///
/// Implemented for any `Fn(&TrialParams) -> ModelResult + Sync`.
pub trait OutcomeModel: Sync {
    fn evaluate(&self, params: &TrialParams) -> ModelResult;
}

impl<F> OutcomeModel for F
where
    F: Fn(&TrialParams) -> ModelResult + Sync,
{
    fn evaluate(&self, params: &TrialParams) -> ModelResult {
        self(params)
    }
}

/// Look up a sampled input inside a model function.
pub fn trial_param(params: &TrialParams, name: &str) -> ModelResult {
    params
        .get(name)
        .copied()
        .ok_or_else(|| ModelError::new(format!("missing input '{}'", name)))
}

// ─── Inputs ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputVariable {
    pub name: String,
    pub distribution: DistributionSpec,
}

impl InputVariable {
    pub fn new(name: impl Into<String>, distribution: DistributionSpec) -> Self {
        Self { name: name.into(), distribution }
    }
}

// ─── Trials ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Ok(f64),
    ModelError(ModelError),
    NonFinite(f64),
}

impl TrialOutcome {
    fn classify(result: ModelResult) -> Self {
        match result {
            Ok(v) if v.is_finite() => Self::Ok(v),
            Ok(v) => Self::NonFinite(v),
            Err(e) => Self::ModelError(e),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Ok(v) => Some(*v),
            _ => None,
        }
    }
}

/// One Monte Carlo iteration: its sampled inputs and what the model made of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub inputs: TrialParams,
    pub outcome: TrialOutcome,
}

impl Trial {
    fn evaluate<M: OutcomeModel + ?Sized>(model: &M, names: &[String], values: Vec<f64>) -> Self {
        let inputs: TrialParams = names.iter().cloned().zip(values).collect();
        let outcome = TrialOutcome::classify(model.evaluate(&inputs));
        Self { inputs, outcome }
    }
}

/// Raw trials of a run plus any sampling warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialBatch {
    pub trials: Vec<Trial>,
    pub warnings: Vec<String>,
}

// ─── Result ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialFailures {
    pub model_errors: usize,
    pub non_finite: usize,
}

impl TrialFailures {
    pub fn total(&self) -> usize {
        self.model_errors + self.non_finite
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub iterations_requested: usize,
    pub iterations_succeeded: usize,
    #[serde(flatten)]
    pub summary: Summary,
    pub failures: TrialFailures,
    pub warnings: Vec<String>,
}

impl SimulationResult {
    pub fn p10(&self) -> f64 {
        self.summary.p10
    }

    pub fn p50(&self) -> f64 {
        self.summary.p50
    }

    pub fn p90(&self) -> f64 {
        self.summary.p90
    }

    pub fn success_rate(&self) -> f64 {
        self.iterations_succeeded as f64 / self.iterations_requested as f64
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

pub struct MonteCarloEngine<R> {
    rng: R,
    config: EngineConfig,
}

impl MonteCarloEngine<DefaultRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(random::create_rng(seed))
    }

    /// Engine over the default generator, seeded from `config.seed` or, when
    /// absent, from OS entropy.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => random::create_rng(seed),
            None => DefaultRng::from_entropy(),
        };
        Ok(Self { rng, config })
    }
}

impl<R: Rng> MonteCarloEngine<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, config: EngineConfig::default() }
    }

    pub fn with_config(rng: R, config: EngineConfig) -> Self {
        Self { rng, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `iterations` trials and aggregate the surviving outcomes.
    ///
    /// With a correlation matrix, its rows follow the order of `variables`.
    ///
    /// # Errors
    ///
    /// Configuration errors from the inputs (unsupported or invalid
    /// distributions, mismatched or non-positive-definite correlation under the
    /// strict policy), and `NoValidTrials` when every trial was discarded.
    pub fn run<M: OutcomeModel + ?Sized>(
        &mut self,
        variables: &[InputVariable],
        correlation: Option<&CorrelationMatrix>,
        model: &M,
        iterations: usize,
    ) -> Result<SimulationResult> {
        let batch = self.run_trials(variables, correlation, model, iterations)?;
        self.aggregate(batch, iterations)
    }

    /// [`run`](Self::run) with `config.iterations`.
    pub fn run_configured<M: OutcomeModel + ?Sized>(
        &mut self,
        variables: &[InputVariable],
        correlation: Option<&CorrelationMatrix>,
        model: &M,
    ) -> Result<SimulationResult> {
        let iterations = self.config.iterations;
        self.run(variables, correlation, model, iterations)
    }

    /// Sample and evaluate every trial without aggregating.
    pub fn run_trials<M: OutcomeModel + ?Sized>(
        &mut self,
        variables: &[InputVariable],
        correlation: Option<&CorrelationMatrix>,
        model: &M,
        iterations: usize,
    ) -> Result<TrialBatch> {
        let (inputs, warnings) = self.sample_inputs(variables, correlation, iterations)?;
        let names: Vec<String> = variables.iter().map(|v| v.name.clone()).collect();

        let trials = if self.config.parallel {
            evaluate_parallel(model, &names, inputs)
        } else {
            inputs.into_iter().map(|v| Trial::evaluate(model, &names, v)).collect()
        };

        Ok(TrialBatch { trials, warnings })
    }

    fn sample_inputs(
        &mut self,
        variables: &[InputVariable],
        correlation: Option<&CorrelationMatrix>,
        iterations: usize,
    ) -> Result<(Vec<Vec<f64>>, Vec<String>)> {
        if iterations == 0 {
            return Err(AnalyticsError::invalid("iterations must be positive"));
        }
        if variables.is_empty() {
            return Err(AnalyticsError::invalid("at least one input variable is required"));
        }
        let mut seen = HashSet::new();
        for v in variables {
            if !seen.insert(v.name.as_str()) {
                return Err(AnalyticsError::invalid(format!(
                    "duplicate input variable '{}'",
                    v.name
                )));
            }
        }

        let dists = variables
            .iter()
            .map(|v| Distribution::from_spec(&v.distribution))
            .collect::<Result<Vec<_>>>()?;

        let Some(corr) = correlation else {
            let inputs: Vec<Vec<f64>> = (0..iterations)
                .map(|_| dists.iter().map(|d| d.sample(&mut self.rng)).collect())
                .collect();
            return Ok((inputs, Vec::new()));
        };

        let dim = dists.len();
        if corr.dim() != dim {
            return Err(AnalyticsError::DimensionMismatch { expected: dim, got: corr.dim() });
        }
        let normals = correlation::generate_with(
            &mut self.rng,
            &vec![0.0; dim],
            &vec![1.0; dim],
            corr,
            iterations,
            self.config.correlation_policy,
        )?;

        let mut warnings = Vec::new();
        if normals.has_warning() {
            warnings.push(format!(
                "correlation matrix is not positive definite; clamped Cholesky pivots {:?}",
                normals.clamped_pivots
            ));
        }

        let inputs: Vec<Vec<f64>> = normals
            .samples
            .into_iter()
            .map(|z| dists.iter().zip(z).map(|(d, z)| d.from_standard_normal(z)).collect())
            .collect();
        Ok((inputs, warnings))
    }

    fn aggregate(&self, batch: TrialBatch, requested: usize) -> Result<SimulationResult> {
        let mut failures = TrialFailures::default();
        let mut outcomes = Vec::with_capacity(batch.trials.len());

        for (i, trial) in batch.trials.iter().enumerate() {
            match &trial.outcome {
                TrialOutcome::Ok(v) => outcomes.push(*v),
                TrialOutcome::ModelError(e) => {
                    failures.model_errors += 1;
                    tracing::trace!(trial = i, error = %e, "trial discarded");
                }
                TrialOutcome::NonFinite(v) => {
                    failures.non_finite += 1;
                    tracing::trace!(trial = i, value = *v, "trial discarded: non-finite outcome");
                }
            }
        }

        let succeeded = outcomes.len();
        if succeeded == 0 {
            tracing::warn!(requested, "monte carlo run produced no valid trials");
            return Err(AnalyticsError::NoValidTrials { requested });
        }
        if succeeded * 2 < requested {
            tracing::warn!(
                requested,
                succeeded,
                model_errors = failures.model_errors,
                non_finite = failures.non_finite,
                "more than half of the trials were discarded"
            );
        }

        let summary = statistics::summarize(&outcomes, self.config.histogram_bins)?;
        tracing::debug!(
            requested,
            succeeded,
            p90 = summary.p90,
            p50 = summary.p50,
            p10 = summary.p10,
            "monte carlo run complete"
        );

        Ok(SimulationResult {
            iterations_requested: requested,
            iterations_succeeded: succeeded,
            summary,
            failures,
            warnings: batch.warnings,
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn evaluate_parallel<M: OutcomeModel + ?Sized>(
    model: &M,
    names: &[String],
    inputs: Vec<Vec<f64>>,
) -> Vec<Trial> {
    use rayon::prelude::*;
    inputs.into_par_iter().map(|v| Trial::evaluate(model, names, v)).collect()
}

#[cfg(target_arch = "wasm32")]
fn evaluate_parallel<M: OutcomeModel + ?Sized>(
    model: &M,
    names: &[String],
    inputs: Vec<Vec<f64>>,
) -> Vec<Trial> {
    inputs.into_iter().map(|v| Trial::evaluate(model, names, v)).collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationPolicy;
    use crate::error::ErrorKind;
    use crate::statistics::pearson_correlation;

    fn identity_model(p: &TrialParams) -> ModelResult {
        trial_param(p, "x")
    }

    fn single(spec: DistributionSpec) -> Vec<InputVariable> {
        vec![InputVariable::new("x", spec)]
    }

    #[test]
    fn failing_trials_are_skipped() {
        let model = |p: &TrialParams| -> ModelResult {
            let x = trial_param(p, "x")?;
            if x < 0.0 {
                return Err(ModelError::new("negative pressure"));
            }
            Ok(x)
        };
        let mut engine = MonteCarloEngine::seeded(42);
        let r = engine
            .run(&single(DistributionSpec::normal(1.0, 5.0)), None, &model, 10_000)
            .unwrap();
        assert_eq!(r.iterations_requested, 10_000);
        assert!(r.iterations_succeeded < r.iterations_requested);
        assert!(r.iterations_succeeded > 5_000);
        assert_eq!(r.failures.model_errors, 10_000 - r.iterations_succeeded);
        assert_eq!(r.failures.non_finite, 0);
        assert!(r.summary.min >= 0.0);
    }

    #[test]
    fn non_finite_outcomes_are_skipped() {
        let model = |p: &TrialParams| -> ModelResult { Ok(trial_param(p, "x")?.sqrt()) };
        let r = MonteCarloEngine::seeded(3)
            .run(&single(DistributionSpec::normal(0.0, 1.0)), None, &model, 2_000)
            .unwrap();
        assert!(r.failures.non_finite > 0);
        assert_eq!(r.failures.model_errors, 0);
        assert_eq!(r.iterations_succeeded + r.failures.total(), 2_000);
    }

    #[test]
    fn all_trials_failing_is_an_error() {
        let model = |_: &TrialParams| -> ModelResult { Err(ModelError::new("always")) };
        let err = MonteCarloEngine::seeded(0)
            .run(&single(DistributionSpec::uniform(0.0, 1.0)), None, &model, 100)
            .unwrap_err();
        assert_eq!(err, AnalyticsError::NoValidTrials { requested: 100 });
        assert!(!err.kind().is_configuration());
    }

    #[test]
    fn same_seed_same_result() {
        let vars = single(DistributionSpec::triangular(1.0, 2.0, 6.0));
        let a = MonteCarloEngine::seeded(11).run(&vars, None, &identity_model, 1_000).unwrap();
        let b = MonteCarloEngine::seeded(11).run(&vars, None, &identity_model, 1_000).unwrap();
        assert_eq!(a, b);
        let c = MonteCarloEngine::seeded(12).run(&vars, None, &identity_model, 1_000).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn parallel_matches_sequential() {
        let vars = vec![
            InputVariable::new("a", DistributionSpec::normal(10.0, 2.0)),
            InputVariable::new("b", DistributionSpec::lognormal(3.0, 1.0)),
        ];
        let model =
            |p: &TrialParams| -> ModelResult { Ok(trial_param(p, "a")? * trial_param(p, "b")?) };
        let corr = CorrelationMatrix::pair(0.5).unwrap();

        let sequential = MonteCarloEngine::seeded(8)
            .run(&vars, Some(&corr), &model, 5_000)
            .unwrap();
        let config = EngineConfig { parallel: true, ..EngineConfig::default() };
        let parallel = MonteCarloEngine::with_config(random::create_rng(8), config)
            .run(&vars, Some(&corr), &model, 5_000)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn correlated_inputs_follow_matrix() {
        let vars = vec![
            InputVariable::new("x", DistributionSpec::uniform(0.0, 1.0)),
            InputVariable::new("y", DistributionSpec::uniform(0.0, 1.0)),
        ];
        let corr = CorrelationMatrix::pair(0.9).unwrap();
        let batch = MonteCarloEngine::seeded(21)
            .run_trials(&vars, Some(&corr), &identity_model, 20_000)
            .unwrap();
        let xs: Vec<f64> = batch.trials.iter().map(|t| t.inputs["x"]).collect();
        let ys: Vec<f64> = batch.trials.iter().map(|t| t.inputs["y"]).collect();
        let r = pearson_correlation(&xs, &ys).unwrap();
        // Gaussian copula on uniform marginals: 6/pi * asin(0.45) ~= 0.89
        assert!((r - 0.89).abs() < 0.03, "correlation {}", r);
        assert!(xs.iter().chain(&ys).all(|v| (0.0..=1.0).contains(v)));
        assert!(batch.warnings.is_empty());
    }

    #[test]
    fn clamped_correlation_surfaces_warning() {
        let vars: Vec<InputVariable> = ["a", "b", "c"]
            .iter()
            .map(|n| InputVariable::new(*n, DistributionSpec::normal(0.0, 1.0)))
            .collect();
        let corr = CorrelationMatrix::new(vec![
            vec![1.0, 0.9, -0.9],
            vec![0.9, 1.0, 0.9],
            vec![-0.9, 0.9, 1.0],
        ])
        .unwrap();
        let model = |p: &TrialParams| -> ModelResult { Ok(p.values().sum()) };
        let r = MonteCarloEngine::seeded(1).run(&vars, Some(&corr), &model, 500).unwrap();
        assert_eq!(r.iterations_succeeded, 500);
        assert_eq!(r.warnings.len(), 1);

        let strict = EngineConfig {
            correlation_policy: CorrelationPolicy::Strict,
            ..EngineConfig::default()
        };
        let err = MonteCarloEngine::with_config(random::create_rng(1), strict)
            .run(&vars, Some(&corr), &model, 500)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonPositiveDefinite);
    }

    #[test]
    fn configuration_errors() {
        let mut engine = MonteCarloEngine::seeded(0);
        let vars = single(DistributionSpec::uniform(0.0, 1.0));

        let err = engine.run(&vars, None, &identity_model, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);

        let dup = vec![vars[0].clone(), vars[0].clone()];
        let err = engine.run(&dup, None, &identity_model, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameters);

        let corr = CorrelationMatrix::identity(2);
        let err = engine.run(&vars, Some(&corr), &identity_model, 10).unwrap_err();
        assert_eq!(err, AnalyticsError::DimensionMismatch { expected: 1, got: 2 });

        let bad = single(DistributionSpec::new("Beta", &[("alpha", 2.0)]));
        let err = engine.run(&bad, None, &identity_model, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedDistribution);
    }

    #[test]
    fn volumetric_oil_in_place() {
        // STOIIP = 7758 * A * h * phi * (1 - Sw) / Bo, barrels
        let vars = vec![
            InputVariable::new("area", DistributionSpec::triangular(800.0, 1000.0, 1400.0)),
            InputVariable::new("thickness", DistributionSpec::uniform(40.0, 60.0)),
            InputVariable::new("porosity", DistributionSpec::normal(0.22, 0.02)),
            InputVariable::new("sw", DistributionSpec::triangular(0.2, 0.25, 0.35)),
            InputVariable::new("bo", DistributionSpec::lognormal(1.25, 0.05)),
        ];
        let model = |p: &TrialParams| -> ModelResult {
            let phi = trial_param(p, "porosity")?;
            if phi <= 0.0 {
                return Err(ModelError::new("non-physical porosity"));
            }
            Ok(7758.0
                * trial_param(p, "area")?
                * trial_param(p, "thickness")?
                * phi
                * (1.0 - trial_param(p, "sw")?)
                / trial_param(p, "bo")?)
        };
        let r = MonteCarloEngine::seeded(2026).run_configured(&vars, None, &model).unwrap();
        assert_eq!(r.iterations_requested, 10_000);
        assert!(r.p90() < r.p50() && r.p50() < r.p10());
        let deterministic = 7758.0 * 1066.67 * 50.0 * 0.22 * (1.0 - 0.2667) / 1.25;
        assert!((r.summary.mean / deterministic - 1.0).abs() < 0.05, "mean {}", r.summary.mean);
        assert_eq!(r.summary.histogram.total(), r.iterations_succeeded);
    }

    #[test]
    fn from_config_uses_seed() {
        let config = EngineConfig::default().with_seed(5).with_iterations(200);
        let vars = single(DistributionSpec::normal(0.0, 1.0));
        let a = MonteCarloEngine::from_config(config.clone())
            .unwrap()
            .run_configured(&vars, None, &identity_model)
            .unwrap();
        let b = MonteCarloEngine::seeded(5).run(&vars, None, &identity_model, 200).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dyn_models_are_accepted() {
        let boxed: Box<dyn OutcomeModel> =
            Box::new(|p: &TrialParams| -> ModelResult { Ok(2.0 * trial_param(p, "x")?) });
        let r = MonteCarloEngine::seeded(4)
            .run(&single(DistributionSpec::uniform(0.0, 1.0)), None, boxed.as_ref(), 1_000)
            .unwrap();
        assert!(r.summary.max <= 2.0);
    }
}

#[cfg(test)]
mod tests {
    use reserves_engine::correlation::CorrelatedSampler;
    use reserves_engine::monte_carlo::trial_param;
    use reserves_engine::outliers::{detect, DEFAULT_Z_THRESHOLD};
    use reserves_engine::regression::{fit, fit_line};
    use reserves_engine::statistics::pearson_correlation;
    use reserves_engine::{
        summarize, AnalyticsError, CorrelationMatrix, DistributionSampler, DistributionSpec,
        EngineConfig, ErrorKind, InputVariable, ModelError, ModelResult, MonteCarloEngine,
        TrialParams,
    };

    // ========== Statistics ==========

    #[test]
    fn test_percentile_ordering_on_skewed_series() {
        let values: Vec<f64> = (1..=500).map(|i| (i as f64).powf(1.7)).collect();
        let s = summarize(&values, 20).unwrap();
        assert!(s.p90 <= s.p50 && s.p50 <= s.p10);
        assert!(s.p90 < s.p10, "non-constant series should spread");
        assert_eq!(s.histogram.total(), 500);
    }

    #[test]
    fn test_summarize_is_idempotent() {
        let values = vec![4.2, -1.0, 7.7, 3.3, 3.3, 10.0, 0.5];
        let snapshot = values.clone();
        let first = summarize(&values, 6).unwrap();
        let second = summarize(&values, 6).unwrap();
        assert_eq!(first, second);
        assert_eq!(values, snapshot, "input mutated");
    }

    // ========== Sampling ==========

    #[test]
    fn test_uniform_sampling_convergence() {
        let mut sampler = DistributionSampler::seeded(2024);
        let draws = sampler.sample_n(&DistributionSpec::uniform(0.0, 10.0), 100_000).unwrap();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        println!("Uniform(0,10) mean: {}", mean);
        assert!((mean - 5.0).abs() < 0.05);
    }

    #[test]
    fn test_unsupported_distribution_is_hard_failure() {
        let mut sampler = DistributionSampler::seeded(1);
        let spec = DistributionSpec::new("Weibull", &[("shape", 2.0)]);
        let err = sampler.sample(&spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedDistribution);
        assert!(err.kind().is_configuration());
    }

    #[test]
    fn test_correlation_preservation() {
        let corr = CorrelationMatrix::pair(0.8).unwrap();
        let mut sampler = CorrelatedSampler::seeded(77);
        let out = sampler.generate(&[100.0, 0.2], &[15.0, 0.05], &corr, 50_000).unwrap();
        assert!(!out.has_warning());
        let r = pearson_correlation(&out.column(0), &out.column(1)).unwrap();
        println!("Empirical correlation: {}", r);
        assert!((r - 0.8).abs() < 0.03);
    }

    // ========== Regression ==========

    #[test]
    fn test_regression_exactness() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 + 3.0 * v).collect();
        let model = fit_line(&x, &y, None);
        assert!(model.success);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients[1] - 3.0).abs() < 1e-6);
        assert!((model.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_regression_degeneracy_never_panics() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| 1.0 + i as f64).collect();
        let model = fit(&x, &y, None);
        assert!(!model.success);
        assert!(model.error.is_some());
    }

    // ========== Outliers ==========

    #[test]
    fn test_outlier_detection_flags_only_spike() {
        let found = detect(&[1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 50.0], 2.5);
        let indices: Vec<usize> = found.iter().map(|o| o.index).collect();
        assert_eq!(indices, vec![8]);
    }

    // ========== Monte Carlo ==========

    #[test]
    fn test_monte_carlo_resilience() {
        let mut engine = MonteCarloEngine::seeded(42);
        let vars = vec![InputVariable::new("x", DistributionSpec::normal(1.0, 5.0))];
        let model = |p: &TrialParams| -> ModelResult {
            let x = trial_param(p, "x")?;
            if x < 0.0 {
                return Err(ModelError::new("negative input"));
            }
            Ok(x.sqrt())
        };
        let result = engine.run(&vars, None, &model, 10_000).unwrap();
        println!(
            "Succeeded {}/{} (model errors {})",
            result.iterations_succeeded, result.iterations_requested, result.failures.model_errors
        );
        assert_eq!(result.iterations_requested, 10_000);
        assert!(result.iterations_succeeded < result.iterations_requested);
        assert!(result.iterations_succeeded > 0);
        assert_eq!(
            result.iterations_succeeded + result.failures.total(),
            result.iterations_requested
        );
    }

    #[test]
    fn test_monte_carlo_all_trials_failing() {
        let mut engine = MonteCarloEngine::seeded(3);
        let vars = vec![InputVariable::new("x", DistributionSpec::uniform(0.0, 1.0))];
        let model = |_: &TrialParams| -> ModelResult { Err(ModelError::new("always")) };
        let err = engine.run(&vars, None, &model, 100).unwrap_err();
        assert_eq!(err, AnalyticsError::NoValidTrials { requested: 100 });
        assert!(!err.kind().is_configuration());
    }

    #[test]
    fn test_volumetric_ooip_percentiles() {
        // OOIP = 7758 · A · h · φ · (1 - Sw) / Bo, in STB
        let vars = vec![
            InputVariable::new("area", DistributionSpec::triangular(800.0, 1200.0, 2000.0)),
            InputVariable::new("thickness", DistributionSpec::lognormal(40.0, 8.0)),
            InputVariable::new("porosity", DistributionSpec::normal(0.22, 0.03)),
            InputVariable::new("sw", DistributionSpec::uniform(0.2, 0.35)),
            InputVariable::new("bo", DistributionSpec::uniform(1.15, 1.35)),
        ];
        let ooip = |p: &TrialParams| -> ModelResult {
            let porosity = trial_param(p, "porosity")?;
            if porosity <= 0.0 {
                return Err(ModelError::new("non-physical porosity"));
            }
            Ok(7758.0
                * trial_param(p, "area")?
                * trial_param(p, "thickness")?
                * porosity
                * (1.0 - trial_param(p, "sw")?)
                / trial_param(p, "bo")?)
        };

        let config = EngineConfig::default().with_seed(1987).with_iterations(20_000);
        let mut engine = MonteCarloEngine::from_config(config).unwrap();
        let result = engine.run_configured(&vars, None, &ooip).unwrap();
        println!("P90 {:.3e}  P50 {:.3e}  P10 {:.3e}", result.p90(), result.p50(), result.p10());
        assert!(result.p90() < result.p50() && result.p50() < result.p10());
        // deterministic P50 ≈ 7758·1333·40·0.22·0.725/1.25 ≈ 5.3e7
        assert!(result.p50() > 3.5e7 && result.p50() < 7.5e7);
    }

    #[test]
    fn test_correlated_run_is_reproducible() {
        let vars = vec![
            InputVariable::new("porosity", DistributionSpec::normal(0.2, 0.03)),
            InputVariable::new("sw", DistributionSpec::uniform(0.15, 0.4)),
        ];
        let corr = CorrelationMatrix::pair(-0.6).unwrap();
        let model = |p: &TrialParams| -> ModelResult {
            Ok(trial_param(p, "porosity")? * (1.0 - trial_param(p, "sw")?))
        };
        let a = MonteCarloEngine::seeded(5).run(&vars, Some(&corr), &model, 2_000).unwrap();
        let b = MonteCarloEngine::seeded(5).run(&vars, Some(&corr), &model, 2_000).unwrap();
        assert_eq!(a, b);
        assert!(a.warnings.is_empty());
    }

    // ========== Regression → Monte Carlo ==========

    #[test]
    fn test_regression_slope_drives_monte_carlo_input() {
        // Havlena–Odeh F = N · Et, noisy observations
        let et: Vec<f64> = (1..=12).map(|i| 0.002 * i as f64).collect();
        let noise = [1.0, -1.5, 0.5, 2.0, -0.5, -2.0, 1.5, 0.0, -1.0, 1.0, 0.5, -1.5];
        let f: Vec<f64> = et.iter().zip(noise).map(|(e, n)| 5.0e7 * e + 1.0e3 * n).collect();

        let model = fit_line(&et, &f, None);
        assert!(model.success);
        assert!(model.std_errors[1] > 0.0);
        let n_spec = model.coefficient_distribution(1).unwrap();

        let vars = vec![InputVariable::new("ooip", n_spec)];
        let recovery = |p: &TrialParams| -> ModelResult { Ok(0.3 * trial_param(p, "ooip")?) };
        let result = MonteCarloEngine::seeded(9).run(&vars, None, &recovery, 5_000).unwrap();
        assert_eq!(result.iterations_succeeded, 5_000);
        let expected = 0.3 * model.coefficients[1];
        assert!((result.summary.mean - expected).abs() / expected < 0.01);
        assert!(result.p90() < expected && expected < result.p10());
    }

    #[test]
    fn test_residual_screening_uses_default_threshold() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 10.0 - 0.5 * v + if i % 3 == 0 { 0.2 } else { -0.1 })
            .collect();
        y[4] -= 8.0;
        let model = fit_line(&x, &y, None);
        let found = reserves_engine::detect_residual_outliers(&model, DEFAULT_Z_THRESHOLD);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 4);
        assert!(found[0].z_score > DEFAULT_Z_THRESHOLD);
    }
}

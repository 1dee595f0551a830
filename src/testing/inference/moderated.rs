//! Linear model fits with empirical-Bayes moderated variances.
//!
//! Each row is fitted by least squares against the design. The residual variances of
//! all rows are then summarised by a scaled inverse chi-square prior, and every row's
//! variance is shrunk towards the prior before the t statistic is formed. The prior
//! adds `df_prior` degrees of freedom to every row, which is what makes five versus
//! five sample comparisons usable.

use log::{debug, warn};
use ndarray::Array2;
use rayon::prelude::*;
use statrs::function::gamma::digamma;

use crate::data::groups::{DesignMatrix, ExpressionMatrix};
use crate::error::{OmicsError, Result};
use crate::testing::effect::{average_expression, confidence_interval};
use crate::testing::inference::linear_model::{RowFit, fit_row};
use crate::testing::inference::parametric::{t_statistic, two_sided_p_value};
use crate::testing::inference::TestOptions;
use crate::testing::utils::{median, trigamma, trigamma_inverse};
use crate::testing::{FitError, FitFailure, RankedResults, TestMethod, TestResult, VariancePrior};

/// Variances are floored at this fraction of their median before taking logs.
const VARIANCE_FLOOR: f64 = 1e-5;

/// Estimate the variance prior from per-row residual variances.
///
/// Rows with non-finite variance or no residual degrees of freedom are ignored. With
/// fewer than two usable rows there is nothing to pool and the prior carries zero
/// degrees of freedom. When the log-variances spread no more than sampling alone
/// explains, the prior degrees of freedom are infinite and the prior variance is the
/// mean of the floored variances.
pub fn fit_f_dist(variances: &[f64], dfs: &[f64]) -> VariancePrior {
    let (x, df): (Vec<f64>, Vec<f64>) = variances
        .iter()
        .zip(dfs)
        .filter(|&(&v, &d)| v.is_finite() && v > -1e-15 && d.is_finite() && d > 1e-15)
        .map(|(&v, &d)| (v.max(0.0), d))
        .unzip();

    match x.len() {
        0 => {
            return VariancePrior {
                df_prior: 0.0,
                var_prior: f64::NAN,
            };
        }
        1 => {
            return VariancePrior {
                df_prior: 0.0,
                var_prior: x[0],
            };
        }
        _ => {}
    }

    let n = x.len() as f64;
    let mut m = median(&x).unwrap_or(1.0);
    if m == 0.0 {
        m = 1.0;
    }
    let floor = VARIANCE_FLOOR * m;
    let x: Vec<f64> = x.into_iter().map(|v| v.max(floor)).collect();

    let e: Vec<f64> = x
        .iter()
        .zip(&df)
        .map(|(&v, &d)| v.ln() - digamma(d / 2.0) + (d / 2.0).ln())
        .collect();
    let e_mean = e.iter().sum::<f64>() / n;
    let e_var = e.iter().map(|v| (v - e_mean).powi(2)).sum::<f64>() / (n - 1.0);
    let e_var = e_var - df.iter().map(|&d| trigamma(d / 2.0)).sum::<f64>() / n;

    if e_var > 0.0 {
        let df_prior = 2.0 * trigamma_inverse(e_var);
        let var_prior = (e_mean + digamma(df_prior / 2.0) - (df_prior / 2.0).ln()).exp();
        VariancePrior {
            df_prior,
            var_prior,
        }
    } else {
        // pooled variance, the MLE of the scale when df_prior is infinite
        VariancePrior {
            df_prior: f64::INFINITY,
            var_prior: x.iter().sum::<f64>() / n,
        }
    }
}

/// Posterior variance of a row with residual variance `sigma2` on `df` degrees of
/// freedom. `NaN` when neither the row nor the prior carries information.
pub fn posterior_variance(sigma2: f64, df: f64, prior: &VariancePrior) -> f64 {
    if prior.df_prior.is_infinite() {
        return prior.var_prior;
    }
    if prior.df_prior <= 0.0 {
        return if df > 0.0 { sigma2 } else { f64::NAN };
    }
    if df <= 0.0 {
        return prior.var_prior;
    }
    (prior.df_prior * prior.var_prior + df * sigma2) / (prior.df_prior + df)
}

/// Moderated t-test of one design coefficient for every row of `matrix`.
///
/// Rows that cannot be fitted are reported in [`RankedResults::excluded`]; the
/// remaining rows are adjusted with `options.adjust_method` and ranked.
///
/// # Errors
///
/// * [`OmicsError::Design`] if the matrix and design disagree or `coefficient` is out
///   of range
/// * [`OmicsError::Fit`] if no row could be fitted
pub fn moderated_t_test(
    matrix: &ExpressionMatrix,
    design: &DesignMatrix,
    coefficient: usize,
    options: &TestOptions,
) -> Result<RankedResults> {
    matrix.check_design(design)?;
    if coefficient >= design.ncoefficients() {
        return Err(OmicsError::Design(format!(
            "coefficient {coefficient} out of range for {} coefficient(s)",
            design.ncoefficients()
        )));
    }

    let fits = fit_rows(matrix, &design.values);

    let (variances, dfs): (Vec<f64>, Vec<f64>) = fits
        .iter()
        .filter_map(|fit| fit.as_ref().ok())
        .map(|fit| (fit.sigma2, fit.df_residual))
        .unzip();
    let prior = fit_f_dist(&variances, &dfs);
    let pooled_df: f64 = dfs.iter().sum();
    debug!(
        "Variance prior: df_prior = {}, var_prior = {}",
        prior.df_prior, prior.var_prior
    );

    let mut results = Vec::with_capacity(fits.len());
    let mut excluded = Vec::new();
    for (row, fit) in fits.into_iter().enumerate() {
        let name = &matrix.row_names[row];
        let outcome = fit.and_then(|fit| moderate_row(row, name, &fit, coefficient, &prior, pooled_df, options));
        match outcome {
            Ok(result) => results.push(result.with_average_expression(average_expression(matrix.values.row(row)))),
            Err(reason) => excluded.push(FitError {
                row,
                name: name.clone(),
                reason,
            }),
        }
    }

    if results.is_empty() {
        return Err(OmicsError::Fit {
            excluded: excluded.len(),
        });
    }
    if !excluded.is_empty() {
        warn!("{} row(s) excluded from the model fit", excluded.len());
        for error in &excluded {
            debug!("Excluded {error}");
        }
    }

    Ok(RankedResults::rank(
        results,
        excluded,
        TestMethod::Moderated,
        options.adjust_method,
        Some(prior),
    )?)
}

fn fit_rows(matrix: &ExpressionMatrix, design: &Array2<f64>) -> Vec<std::result::Result<RowFit, FitFailure>> {
    (0..matrix.nrows())
        .into_par_iter()
        .map(|row| fit_row(matrix.values.row(row), design))
        .collect()
}

fn moderate_row(
    row: usize,
    name: &str,
    fit: &RowFit,
    coefficient: usize,
    prior: &VariancePrior,
    pooled_df: f64,
    options: &TestOptions,
) -> std::result::Result<TestResult, FitFailure> {
    let s2_post = posterior_variance(fit.sigma2, fit.df_residual, prior);
    if !s2_post.is_finite() {
        return Err(FitFailure::NoResidualDegreesOfFreedom);
    }

    let effect = fit.coefficients[coefficient];
    let se = fit.stdev_unscaled[coefficient] * s2_post.sqrt();
    let df_total = (fit.df_residual + prior.df_prior).min(pooled_df);
    let t_stat = t_statistic(effect, se);

    let mut result = TestResult::new(row, name, t_stat, two_sided_p_value(t_stat, df_total))
        .with_effect_size(effect, se)
        .with_degrees_of_freedom(df_total);
    if let Ok((lo, hi)) = confidence_interval(effect, se, df_total, options.confidence_level) {
        result = result.with_confidence_interval(lo, hi);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    use crate::data::groups::GroupAssignment;

    #[test]
    fn test_equal_variances_give_infinite_prior() {
        let prior = fit_f_dist(&[1.0, 1.0, 1.0, 1.0], &[4.0, 4.0, 4.0, 4.0]);
        assert!(prior.df_prior.is_infinite());
        assert_relative_eq!(prior.var_prior, 1.0, max_relative = 1e-12);

        // Spread well below sampling noise still pools to the plain mean
        let prior = fit_f_dist(&[0.9, 1.1, 1.0, 1.0], &[4.0; 4]);
        assert!(prior.df_prior.is_infinite());
        assert_relative_eq!(prior.var_prior, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn test_spread_variances_give_finite_prior() {
        // limma::fitFDist(c(0.01, 0.02, 0.05, 0.1, 0.5, 1, 2, 5), df1 = 4)
        let variances = [0.01, 0.02, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];
        let prior = fit_f_dist(&variances, &[4.0; 8]);
        assert_relative_eq!(prior.df_prior, 1.061_869_909_079_724, max_relative = 1e-6);
        assert_relative_eq!(prior.var_prior, 0.087_097_066_933_258, max_relative = 1e-6);
    }

    #[test]
    fn test_too_few_rows_for_prior() {
        let prior = fit_f_dist(&[2.0, f64::NAN], &[4.0, 0.0]);
        assert_eq!(prior.df_prior, 0.0);
        assert_eq!(prior.var_prior, 2.0);
        assert!(fit_f_dist(&[], &[]).var_prior.is_nan());
    }

    #[test]
    fn test_posterior_variance() {
        let prior = VariancePrior {
            df_prior: 4.0,
            var_prior: 1.0,
        };
        assert_relative_eq!(posterior_variance(3.0, 4.0, &prior), 2.0);
        assert_eq!(posterior_variance(f64::NAN, 0.0, &prior), 1.0);

        let none = VariancePrior {
            df_prior: 0.0,
            var_prior: 1.0,
        };
        assert_eq!(posterior_variance(3.0, 4.0, &none), 3.0);
        assert!(posterior_variance(f64::NAN, 0.0, &none).is_nan());

        let infinite = VariancePrior {
            df_prior: f64::INFINITY,
            var_prior: 0.5,
        };
        assert_eq!(posterior_variance(3.0, 4.0, &infinite), 0.5);
    }

    #[test]
    fn test_zero_variance_row_without_prior_is_infinite() {
        let fit = RowFit {
            coefficients: vec![1.0, 1.5],
            stdev_unscaled: vec![0.5, (2.0_f64 / 3.0).sqrt()],
            sigma2: 0.0,
            df_residual: 4.0,
            n_observed: 6,
        };
        let no_prior = VariancePrior {
            df_prior: 0.0,
            var_prior: 0.0,
        };
        let options = TestOptions::default();

        let result = moderate_row(0, "Flat", &fit, 1, &no_prior, 4.0, &options).unwrap();
        assert_eq!(result.standard_error, 0.0);
        assert_eq!(result.statistic, f64::INFINITY);
        assert_eq!(result.p_value, 0.0);

        let down = RowFit {
            coefficients: vec![1.0, -1.5],
            ..fit.clone()
        };
        let result = moderate_row(1, "Down", &down, 1, &no_prior, 4.0, &options).unwrap();
        assert_eq!(result.statistic, f64::NEG_INFINITY);

        let unchanged = RowFit {
            coefficients: vec![1.0, 0.0],
            ..fit
        };
        let result = moderate_row(2, "Same", &unchanged, 1, &no_prior, 4.0, &options).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_relative_eq!(result.p_value, 1.0, epsilon = 1e-12);
    }

    fn fixture() -> (ExpressionMatrix, DesignMatrix) {
        let groups = GroupAssignment::new("KO", vec!["ko1", "ko2", "ko3"], "WT", vec!["wt1", "wt2", "wt3"]);
        let design = groups.design_matrix().unwrap();
        let matrix = ExpressionMatrix::new(
            ["Up1", "Flat1", "Flat2", "Noisy1", "Gone1"].map(String::from).to_vec(),
            design.sample_names.clone(),
            array![
                [8.0, 8.1, 7.9, 6.0, 6.1, 5.9],
                [5.0, 5.2, 4.9, 5.1, 5.0, 5.1],
                [3.0, 2.9, 3.2, 3.1, 3.0, 2.9],
                [4.0, 6.0, 5.0, 5.5, 3.5, 4.5],
                [f64::NAN, f64::NAN, f64::NAN, 2.0, 2.1, 2.2]
            ],
        )
        .unwrap();
        (matrix, design)
    }

    #[test]
    fn test_moderated_t_test_ranks_and_excludes() {
        let (matrix, design) = fixture();
        let ranked = moderated_t_test(&matrix, &design, 1, &TestOptions::default()).unwrap();

        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked.excluded_count(), 1);
        assert_eq!(ranked.excluded[0].name, "Gone1");
        assert_eq!(ranked.excluded[0].reason, FitFailure::SingularDesign);

        let top = &ranked.results[0];
        assert_eq!(top.name, "Up1");
        assert_relative_eq!(top.effect_size, 2.0, epsilon = 1e-12);
        assert!(top.statistic > 0.0);
        assert!(top.adjusted_p_value < 0.05);
        assert_relative_eq!(top.average_expression, 7.0, epsilon = 1e-12);

        let prior = ranked.prior.unwrap();
        // 4 fitted rows with 4 residual df each
        for result in &ranked.results {
            assert!(result.degrees_of_freedom <= 16.0);
            assert!(result.degrees_of_freedom >= 4.0);
            assert!(result.adjusted_p_value >= result.p_value);
        }
        assert!(prior.var_prior > 0.0);
    }

    #[test]
    fn test_moderated_t_test_rejects_bad_coefficient() {
        let (matrix, design) = fixture();
        assert!(matches!(
            moderated_t_test(&matrix, &design, 2, &TestOptions::default()),
            Err(OmicsError::Design(_))
        ));
    }

    #[test]
    fn test_all_rows_failing_is_an_error() {
        let groups = GroupAssignment::new("KO", vec!["ko1", "ko2"], "WT", vec!["wt1", "wt2"]);
        let design = groups.design_matrix().unwrap();
        let matrix = ExpressionMatrix::new(
            vec!["A".to_string()],
            design.sample_names.clone(),
            array![[f64::NAN, f64::NAN, 1.0, 1.0]],
        )
        .unwrap();
        assert!(matches!(
            moderated_t_test(&matrix, &design, 1, &TestOptions::default()),
            Err(OmicsError::Fit { excluded: 1 })
        ));
    }

    #[test]
    fn test_saturated_row_borrows_prior() {
        let groups = GroupAssignment::new("KO", vec!["ko1", "ko2", "ko3"], "WT", vec!["wt1", "wt2", "wt3"]);
        let design = groups.design_matrix().unwrap();
        let matrix = ExpressionMatrix::new(
            ["A", "B", "C", "D"].map(String::from).to_vec(),
            design.sample_names.clone(),
            array![
                [5.0, 5.5, 4.5, 4.0, 4.2, 3.8],
                [2.0, 2.6, 2.3, 2.1, 1.7, 1.9],
                [7.0, 7.1, 6.5, 7.3, 6.9, 6.6],
                [9.0, f64::NAN, f64::NAN, 8.0, f64::NAN, f64::NAN]
            ],
        )
        .unwrap();
        let ranked = moderated_t_test(&matrix, &design, 1, &TestOptions::default()).unwrap();
        let prior = ranked.prior.unwrap();
        assert!(prior.df_prior > 0.0);

        let saturated = ranked.get("D").unwrap();
        assert_relative_eq!(saturated.effect_size, 1.0, epsilon = 1e-12);
        assert_relative_eq!(
            saturated.standard_error,
            (2.0 * prior.var_prior).sqrt(),
            max_relative = 1e-9
        );
    }
}

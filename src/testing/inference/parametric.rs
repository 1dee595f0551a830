//! Ordinary two-sample t-tests and the shared t-distribution p-value.
//!
//! The per-row tests here use only the row's own variance. They are kept alongside the
//! moderated test to show how much the empirical-Bayes prior changes the ranking on
//! small groups.

use log::warn;
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::data::groups::ExpressionMatrix;
use crate::testing::effect::{average_expression, confidence_interval};
use crate::testing::inference::TestOptions;
use crate::testing::utils::split_groups;
use crate::testing::{FitError, FitFailure, TTestType, TestResult};

/// Perform t-tests on all rows comparing two groups of samples.
///
/// Missing values are skipped. Rows with fewer than two observed values in either
/// group are returned as [`FitError`]s instead of results.
///
/// # Arguments
///
/// * `matrix` - Log-expression matrix (analytes x samples)
/// * `group1_indices` - Column indices for the first group of samples
/// * `group2_indices` - Column indices for the second group of samples
/// * `test_type` - Type of t-test to perform (Student's or Welch's)
/// * `options` - Confidence level for the effect intervals
///
/// # Returns
///
/// Unadjusted results in row order, and the rows that could not be tested.
pub fn t_test_matrix_groups(
    matrix: &ExpressionMatrix,
    group1_indices: &[usize],
    group2_indices: &[usize],
    test_type: TTestType,
    options: &TestOptions,
) -> anyhow::Result<(Vec<TestResult>, Vec<FitError>)> {
    if group1_indices.is_empty() || group2_indices.is_empty() {
        return Err(anyhow::anyhow!("Group indices cannot be empty"));
    }

    let outcomes: Vec<Result<TestResult, FitError>> = (0..matrix.nrows())
        .into_par_iter()
        .map(|row| {
            let values = matrix.values.row(row);
            let name = &matrix.row_names[row];
            let row_values: Vec<f64> = values.iter().copied().collect();
            let (x, y) = split_groups(&row_values, group1_indices, group2_indices);
            if x.len() < 2 || y.len() < 2 {
                return Err(FitError {
                    row,
                    name: name.clone(),
                    reason: FitFailure::InsufficientObservations {
                        observed: x.len().min(y.len()),
                        required: 2,
                    },
                });
            }

            let test = t_test(&x, &y, test_type);
            let mut result = TestResult::new(row, name, test.statistic, test.p_value)
                .with_effect_size(test.mean_difference, test.standard_error)
                .with_degrees_of_freedom(test.degrees_of_freedom)
                .with_average_expression(average_expression(values));
            if let Ok((lo, hi)) = confidence_interval(
                test.mean_difference,
                test.standard_error,
                test.degrees_of_freedom,
                options.confidence_level,
            ) {
                result = result.with_confidence_interval(lo, hi);
            }
            Ok(result)
        })
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut excluded = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(error) => excluded.push(error),
        }
    }
    if !excluded.is_empty() {
        warn!("{} row(s) have too few values for a t-test", excluded.len());
    }
    Ok((results, excluded))
}

/// Outcome of a two-sample t-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTestOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub mean_difference: f64,
    pub standard_error: f64,
    pub degrees_of_freedom: f64,
}

/// Perform a t-test comparing two samples.
///
/// This function performs either Student's t-test (assuming equal variances) or
/// Welch's t-test (allowing unequal variances) on two samples.
pub fn t_test(x: &[f64], y: &[f64], test_type: TTestType) -> TTestOutcome {
    let (sum_x, sum_sq_x) = x.iter().fold((0.0, 0.0), |(s, sq), &v| (s + v, sq + v * v));
    let (sum_y, sum_sq_y) = y.iter().fold((0.0, 0.0), |(s, sq), &v| (s + v, sq + v * v));

    fast_t_test_from_sums(
        sum_x,
        sum_sq_x,
        x.len() as f64,
        sum_y,
        sum_sq_y,
        y.len() as f64,
        test_type,
    )
}

/// Perform a t-test using precomputed summary statistics.
///
/// # Arguments
///
/// * `sum1`, `sum_sq1`, `n1` - Sum, sum of squares, and count for group 1
/// * `sum2`, `sum_sq2`, `n2` - Sum, sum of squares, and count for group 2
/// * `test_type` - Type of t-test to perform (Student's or Welch's)
pub fn fast_t_test_from_sums(
    sum1: f64,
    sum_sq1: f64,
    n1: f64,
    sum2: f64,
    sum_sq2: f64,
    n2: f64,
    test_type: TTestType,
) -> TTestOutcome {
    // Early exit for insufficient sample sizes
    if n1 < 2.0 || n2 < 2.0 {
        return TTestOutcome {
            statistic: 0.0,
            p_value: 1.0,
            mean_difference: f64::NAN,
            standard_error: f64::NAN,
            degrees_of_freedom: f64::NAN,
        };
    }

    let mean1 = sum1 / n1;
    let mean2 = sum2 / n2;

    // Computational formula, clamped against rounding below zero
    let var1 = ((sum_sq1 - sum1 * sum1 / n1) / (n1 - 1.0)).max(0.0);
    let var2 = ((sum_sq2 - sum2 * sum2 / n2) / (n2 - 1.0)).max(0.0);

    let mean_diff = mean1 - mean2;

    let (std_err, df) = match test_type {
        TTestType::Student => {
            let pooled_var = ((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / (n1 + n2 - 2.0);
            ((pooled_var * (1.0 / n1 + 1.0 / n2)).sqrt(), n1 + n2 - 2.0)
        }
        TTestType::Welch => {
            let term1 = var1 / n1;
            let term2 = var2 / n2;
            let combined_var = term1 + term2;
            // Welch-Satterthwaite equation for degrees of freedom
            let df = combined_var * combined_var
                / (term1 * term1 / (n1 - 1.0) + term2 * term2 / (n2 - 1.0));
            let df = if df.is_finite() { df } else { n1 + n2 - 2.0 };
            (combined_var.sqrt(), df)
        }
    };

    let t_stat = t_statistic(mean_diff, std_err);

    TTestOutcome {
        statistic: t_stat,
        p_value: two_sided_p_value(t_stat, df),
        mean_difference: mean_diff,
        standard_error: std_err,
        degrees_of_freedom: df,
    }
}

/// `effect / se`. A zero standard error gives a signed infinity, or zero when the
/// effect is zero as well.
pub(crate) fn t_statistic(effect: f64, se: f64) -> f64 {
    if se > 0.0 {
        effect / se
    } else if effect == 0.0 {
        0.0
    } else {
        effect.signum() * f64::INFINITY
    }
}

/// Two-sided p-value of a t statistic; the normal distribution is used for infinite
/// degrees of freedom.
pub fn two_sided_p_value(t_stat: f64, df: f64) -> f64 {
    if t_stat.is_nan() || df.is_nan() || df <= 0.0 {
        return 1.0;
    }
    if t_stat.is_infinite() {
        return 0.0;
    }

    let abs_t = t_stat.abs();
    let tail = if df.is_infinite() {
        match Normal::new(0.0, 1.0) {
            Ok(normal) => normal.sf(abs_t),
            Err(_) => return 1.0,
        }
    } else {
        match StudentsT::new(0.0, 1.0, df) {
            Ok(t_dist) => t_dist.sf(abs_t),
            Err(_) => return 1.0,
        }
    };
    (2.0 * tail).clamp(0.0, 1.0)
}

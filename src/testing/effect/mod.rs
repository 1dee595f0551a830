use anyhow::anyhow;
use ndarray::ArrayView1;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::testing::utils::nan_mean;

/// Convert a natural-log ratio into a log2 fold change
pub fn log2_fold_change(ln_ratio: f64) -> f64 {
    ln_ratio / std::f64::consts::LN_2
}

/// Average log expression of a row, ignoring missing values
pub fn average_expression(row: ArrayView1<'_, f64>) -> f64 {
    nan_mean(row.iter().copied()).unwrap_or(f64::NAN)
}

/// Two-sided critical value of the t distribution (normal when `df` is infinite).
pub fn critical_value(level: f64, df: f64) -> anyhow::Result<f64> {
    if !(level > 0.0 && level < 1.0) {
        return Err(anyhow!("Confidence level must be in (0, 1), got {}", level));
    }
    let upper = 1.0 - (1.0 - level) / 2.0;
    if df.is_infinite() {
        let normal = Normal::new(0.0, 1.0)?;
        return Ok(normal.inverse_cdf(upper));
    }
    if df.is_nan() || df <= 0.0 {
        return Err(anyhow!("Degrees of freedom must be positive, got {}", df));
    }
    let t_dist = StudentsT::new(0.0, 1.0, df)?;
    Ok(t_dist.inverse_cdf(upper))
}

/// Confidence interval of an effect estimate with standard error `se`
///
/// # Arguments
///
/// * `effect` - Point estimate
/// * `se` - Standard error of the estimate
/// * `df` - Degrees of freedom of the t distribution
/// * `level` - Coverage, e.g. 0.95
pub fn confidence_interval(effect: f64, se: f64, df: f64, level: f64) -> anyhow::Result<(f64, f64)> {
    let q = critical_value(level, df)?;
    Ok((effect - q * se, effect + q * se))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_log2_fold_change() {
        assert_abs_diff_eq!(log2_fold_change(4.0_f64.ln()), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(log2_fold_change(0.0), 0.0);
        assert!(log2_fold_change(0.5_f64.ln()) < 0.0);
    }

    #[test]
    fn test_average_expression() {
        let row = array![1.0, f64::NAN, 3.0, 5.0];
        assert_abs_diff_eq!(average_expression(row.view()), 3.0);
        let empty = array![f64::NAN, f64::NAN];
        assert!(average_expression(empty.view()).is_nan());
    }

    #[test]
    fn test_confidence_interval() {
        // qt(0.975, 8) = 2.306004
        let (lo, hi) = confidence_interval(1.0, 0.5, 8.0, 0.95).unwrap();
        assert_abs_diff_eq!(lo, 1.0 - 0.5 * 2.306004, epsilon = 1e-5);
        assert_abs_diff_eq!(hi, 1.0 + 0.5 * 2.306004, epsilon = 1e-5);

        // qnorm(0.975) = 1.959964
        let (lo, hi) = confidence_interval(0.0, 1.0, f64::INFINITY, 0.95).unwrap();
        assert_abs_diff_eq!(lo, -1.959964, epsilon = 1e-5);
        assert_abs_diff_eq!(hi, 1.959964, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_interval_inputs() {
        assert!(confidence_interval(0.0, 1.0, 5.0, 1.0).is_err());
        assert!(confidence_interval(0.0, 1.0, 5.0, 0.0).is_err());
        assert!(confidence_interval(0.0, 1.0, 0.0, 0.95).is_err());
    }
}

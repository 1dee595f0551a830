//! Multiple testing correction methods to control for false positives
//! when testing thousands of proteins at once.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;

use crate::testing::AdjustMethod;

/// Adjust p-values with the given method.
///
/// # Arguments
/// * `p_values` - A slice of p-values to adjust
/// * `method` - The correction to apply
///
/// # Returns
/// * `Result<Vec<f64>>` - Adjusted p-values in the input order
pub fn adjust_p_values(p_values: &[f64], method: AdjustMethod) -> Result<Vec<f64>> {
    match method {
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg_correction(p_values),
        AdjustMethod::BenjaminiYekutieli => benjamini_yekutieli_correction(p_values),
        AdjustMethod::Bonferroni => bonferroni_correction(p_values),
        AdjustMethod::Holm => holm_bonferroni_correction(p_values),
        AdjustMethod::Hochberg => hochberg_correction(p_values),
        AdjustMethod::None => {
            validate_p_values(p_values)?;
            Ok(p_values.to_vec())
        }
    }
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }
    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Index-value pairs sorted by ascending p-value. The sort is stable, so equal
/// p-values keep their input order.
fn sorted_ascending(p_values: &[f64]) -> Vec<(usize, f64)> {
    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    indexed_p_values
}

/// Apply Bonferroni correction to p-values
///
/// Bonferroni correction is a simple but conservative method that multiplies
/// each p-value by the number of tests.
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    // Multiply each p-value by n, capping at 1.0
    let adjusted = p_values.iter().map(|&p| (p * n as f64).min(1.0)).collect();

    Ok(adjusted)
}

/// Apply Benjamini-Hochberg (BH) procedure for controlling false discovery rate
///
/// The BH procedure controls the false discovery rate (FDR), which is the expected
/// proportion of false positives among all rejected null hypotheses.
///
/// Sorted ascending, the p-value of rank `i` becomes `min_{j >= i} p_j * n / j`,
/// capped at 1.0.
///
/// # Arguments
/// * `p_values` - A slice of p-values to adjust
///
/// # Returns
/// * `Result<Vec<f64>>` - Vector of adjusted p-values
///
/// # Example
/// ```
/// use omics_statistics::testing::correction::benjamini_hochberg_correction;
///
/// let p_values = vec![0.01, 0.03, 0.05];
/// let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
/// assert!((adjusted[0] - 0.03).abs() < 1e-12);
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    // Process from largest to smallest p-value
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;

        let adjustment = (p_val * n as f64 / rank as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

/// Apply Benjamini-Yekutieli (BY) procedure for controlling false discovery rate under dependence
///
/// The BY procedure is a more conservative variant of the BH procedure that is valid
/// under arbitrary dependence structures among the tests.
pub fn benjamini_yekutieli_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    // Calculate the correction factor
    let c_n: f64 = (1..=n).map(|i| 1.0 / i as f64).sum();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;

        let adjustment = (p_val * c_n * n as f64 / rank as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

/// Apply Holm-Bonferroni (step-down) method for controlling family-wise error rate
///
/// The Holm procedure controls the family-wise error rate (FWER) and is uniformly
/// more powerful than the standard Bonferroni correction. Sorted ascending, rank `i`
/// becomes `max_{k <= i} (n - k + 1) * p_k`, capped at 1.0.
pub fn holm_bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_max: f64 = 0.0;

    for (i, &(orig_idx, p_val)) in indexed_p_values.iter().enumerate() {
        let adjustment = (p_val * (n - i) as f64).min(1.0);
        current_max = current_max.max(adjustment);
        adjusted_p_values[orig_idx] = current_max;
    }

    Ok(adjusted_p_values)
}

/// Apply Hochberg's step-up method for controlling family-wise error rate
///
/// Hochberg's procedure is a step-up method that controls the family-wise error rate (FWER)
/// and is more powerful than Holm's procedure when all tests are independent.
pub fn hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let adjustment = (p_val * (n - i) as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec_relative_eq(a: &[f64], b: &[f64], epsilon: f64) {
        assert_eq!(a.len(), b.len(), "Vectors have different lengths");
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            if (x - y).abs() > epsilon {
                panic!("Vectors differ at index {}: {} != {}", i, x, y);
            }
        }
    }

    #[test]
    fn test_bonferroni() {
        let p_values = vec![0.01, 0.02, 0.03, 0.1, 0.2];
        let expected = vec![0.05, 0.1, 0.15, 0.5, 1.0];
        let adjusted = bonferroni_correction(&p_values).unwrap();
        assert_vec_relative_eq(&adjusted, &expected, 1e-10);
    }

    #[test]
    fn test_benjamini_hochberg_empty_input() {
        let result = benjamini_hochberg_correction(&[]);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().to_string(), "Empty p-value array");
    }

    #[test]
    fn test_benjamini_hochberg_invalid_pvalues() {
        let result = benjamini_hochberg_correction(&[0.01, -0.5, 0.03]);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Invalid p-value at index 1")
        );

        let result = benjamini_hochberg_correction(&[0.01, f64::NAN, 0.03]);
        assert!(result.is_err());
    }

    #[test]
    fn test_benjamini_hochberg_unordered_pvalues() {
        let p_values = vec![0.05, 0.01, 0.1, 0.04, 0.02];
        let expected = vec![0.0625, 0.05, 0.1, 0.0625, 0.05];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();
        assert_vec_relative_eq(&adjusted, &expected, 1e-12);
    }

    #[test]
    fn test_benjamini_hochberg_real_example() {
        let pvalues = vec![0.1, 0.2, 0.3, 0.4, 0.1];
        let expected = [0.25, 0.3333333333333333, 0.375, 0.4, 0.25];
        let adjusted = benjamini_hochberg_correction(&pvalues).unwrap();

        for (a, e) in adjusted.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_benjamini_hochberg_monotone_and_bounded() {
        let p_values = vec![
            0.9, 0.0004, 0.03, 0.5, 0.011, 0.2, 0.04, 0.0001, 0.75, 0.012, 0.3, 0.06,
        ];
        let adjusted = benjamini_hochberg_correction(&p_values).unwrap();

        for (p, q) in p_values.iter().zip(&adjusted) {
            assert!(q >= p);
            assert!(*q <= 1.0);
        }

        let order = sorted_ascending(&p_values);
        for pair in order.windows(2) {
            assert!(adjusted[pair[0].0] <= adjusted[pair[1].0]);
        }
    }

    #[test]
    fn test_benjamini_hochberg_single_pvalue() {
        let adjusted = benjamini_hochberg_correction(&[0.025]).unwrap();
        assert_relative_eq!(adjusted[0], 0.025, epsilon = 1e-10);
    }

    #[test]
    fn test_benjamini_yekutieli_is_more_conservative() {
        let p_values = vec![0.01, 0.02, 0.03, 0.04];
        let bh = benjamini_hochberg_correction(&p_values).unwrap();
        let by = benjamini_yekutieli_correction(&p_values).unwrap();
        // c(4) = 1 + 1/2 + 1/3 + 1/4
        for (b, y) in bh.iter().zip(&by) {
            assert_relative_eq!(*y, b * 25.0 / 12.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_holm_bonferroni() {
        let p_values = vec![0.01, 0.02, 0.03];
        let expected = vec![0.03, 0.04, 0.04];
        let adjusted = holm_bonferroni_correction(&p_values).unwrap();
        assert_vec_relative_eq(&adjusted, &expected, 1e-10);

        let p_values = vec![0.04, 0.001, 0.03];
        let expected = vec![0.06, 0.003, 0.06];
        let adjusted = holm_bonferroni_correction(&p_values).unwrap();
        assert_vec_relative_eq(&adjusted, &expected, 1e-10);
    }

    #[test]
    fn test_hochberg() {
        let p_values = vec![0.01, 0.02, 0.03];
        let expected = vec![0.03, 0.03, 0.03];
        let adjusted = hochberg_correction(&p_values).unwrap();
        assert_vec_relative_eq(&adjusted, &expected, 1e-10);
    }

    #[test]
    fn test_adjust_dispatch() {
        let p_values = vec![0.01, 0.5];
        assert_eq!(
            adjust_p_values(&p_values, AdjustMethod::None).unwrap(),
            p_values
        );
        assert_vec_relative_eq(
            &adjust_p_values(&p_values, AdjustMethod::Bonferroni).unwrap(),
            &[0.02, 1.0],
            1e-12,
        );
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(bonferroni_correction(&[]).is_err());
        assert!(holm_bonferroni_correction(&[]).is_err());
        assert!(hochberg_correction(&[]).is_err());

        let invalid_p = vec![-0.1, 0.5, 1.1];
        assert!(bonferroni_correction(&invalid_p).is_err());
        assert!(benjamini_yekutieli_correction(&invalid_p).is_err());
    }
}

//! Per-row ordinary least squares against a shared design matrix.
//!
//! Missing values are dropped row by row, so two rows of the same matrix may be fitted
//! on different subsets of the design.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView1};

use crate::testing::FitFailure;

/// Relative determinant below which the observed design is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// Least-squares fit of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFit {
    pub coefficients: Vec<f64>,
    /// `sqrt(diag((X'X)^-1))`, the standard errors for unit residual variance
    pub stdev_unscaled: Vec<f64>,
    /// Residual variance, `NaN` when there are no residual degrees of freedom
    pub sigma2: f64,
    pub df_residual: f64,
    pub n_observed: usize,
}

/// Fit `y = X b` on the non-missing entries of `y`.
///
/// # Errors
///
/// * [`FitFailure::InsufficientObservations`] if fewer values than coefficients are
///   observed
/// * [`FitFailure::SingularDesign`] if the observed rows of the design are collinear,
///   for example when every sample of one group is missing
pub fn fit_row(y: ArrayView1<'_, f64>, design: &Array2<f64>) -> Result<RowFit, FitFailure> {
    let p = design.ncols();
    let observed: Vec<usize> = (0..y.len()).filter(|&i| !y[i].is_nan()).collect();
    let n = observed.len();
    if n < p {
        return Err(FitFailure::InsufficientObservations {
            observed: n,
            required: p,
        });
    }

    let x = DMatrix::from_fn(n, p, |i, j| design[[observed[i], j]]);
    let yv = DVector::from_iterator(n, observed.iter().map(|&i| y[i]));

    let xtx = x.transpose() * &x;
    let diag_product: f64 = (0..p).map(|j| xtx[(j, j)]).product();
    if xtx.determinant().abs() <= SINGULAR_TOLERANCE * diag_product.abs() {
        return Err(FitFailure::SingularDesign);
    }
    let xtx_inv = xtx.try_inverse().ok_or(FitFailure::SingularDesign)?;

    let beta = &xtx_inv * x.transpose() * &yv;
    let residuals = &yv - &x * &beta;

    let df_residual = (n - p) as f64;
    let sigma2 = if n > p {
        residuals.norm_squared() / df_residual
    } else {
        f64::NAN
    };

    Ok(RowFit {
        coefficients: beta.iter().copied().collect(),
        stdev_unscaled: (0..p).map(|j| xtx_inv[(j, j)].sqrt()).collect(),
        sigma2,
        df_residual,
        n_observed: n,
    })
}

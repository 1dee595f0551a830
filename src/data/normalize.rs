//! Total-abundance equalization across samples.

use std::collections::HashSet;

use log::{debug, info};

use crate::data::SampleTable;
use crate::error::{OmicsError, Result};
use crate::testing::utils::nan_sum;

/// Sum of the non-missing values of every sample column.
pub fn column_sums(table: &SampleTable) -> Vec<f64> {
    table
        .abundances
        .columns()
        .into_iter()
        .map(|col| nan_sum(col.iter().copied()))
        .collect()
}

/// Rescale the named sample columns so that each sums to the mean of their totals.
///
/// With column sums `S_i` and target `T = mean(S_i)`, every value of column `i` is
/// multiplied by `T / S_i`. Missing values stay missing and columns not listed are
/// left untouched. A column named more than once (before or after header
/// normalization) is rescaled once. This removes loading differences only; no log transform or
/// variance stabilization is applied.
///
/// # Errors
///
/// * [`OmicsError::ColumnMissing`] for unknown column names
/// * [`OmicsError::Normalization`] if `columns` is empty or a column sum is zero or
///   not finite
pub fn normalize<S: AsRef<str>>(table: &SampleTable, columns: &[S]) -> Result<SampleTable> {
    if columns.is_empty() {
        return Err(OmicsError::Normalization {
            column: "<none>".to_string(),
            sum: 0.0,
        });
    }
    let mut indices = table.require_samples(columns)?;
    let mut seen = HashSet::with_capacity(indices.len());
    indices.retain(|&i| seen.insert(i));
    if indices.len() < columns.len() {
        debug!(
            "ignoring {} repeated normalization column(s)",
            columns.len() - indices.len()
        );
    }
    let sums: Vec<f64> = indices
        .iter()
        .map(|&i| nan_sum(table.abundances.column(i).iter().copied()))
        .collect();

    for (&idx, &sum) in indices.iter().zip(&sums) {
        if sum == 0.0 || !sum.is_finite() {
            return Err(OmicsError::Normalization {
                column: table.sample_names[idx].clone(),
                sum,
            });
        }
    }

    let target = sums.iter().sum::<f64>() / sums.len() as f64;
    let mut normalized = table.clone();
    for (&idx, &sum) in indices.iter().zip(&sums) {
        let factor = target / sum;
        normalized
            .abundances
            .column_mut(idx)
            .mapv_inplace(|v| v * factor);
    }

    info!(
        "normalized {} sample column(s) to a total of {:.4e}",
        indices.len(),
        target
    );
    Ok(normalized)
}

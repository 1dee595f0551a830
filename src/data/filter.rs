//! Column selection and row filters.
//!
//! All filters preserve the relative order of the rows they keep and never add or
//! deduplicate rows.

use log::{debug, info};
use ndarray::Array2;

use crate::config::{ColumnSpec, QualityPredicate};
use crate::data::{RawTable, SampleTable, normalize_column_name};
use crate::error::{OmicsError, Result};

/// Cell values read as a missing abundance.
const MISSING_TOKENS: [&str; 4] = ["", "NA", "NaN", "nan"];

/// Keep the allow-listed metadata columns and every abundance column matching the
/// sample prefix.
///
/// Metadata columns appear in allow-list order, abundance columns in source order.
/// A column listed in `spec.keep` is always metadata, even if it matches the prefix.
///
/// # Errors
///
/// * [`OmicsError::ColumnMissing`] listing every allow-listed name absent from the
///   table, or the prefix if no column matches it
/// * [`OmicsError::Parse`] if an abundance cell is neither missing nor a non-negative
///   number
pub fn select_columns(table: &RawTable, spec: &ColumnSpec) -> Result<SampleTable> {
    let keep: Vec<String> = spec.keep.iter().map(|k| normalize_column_name(k)).collect();
    let prefix = normalize_column_name(&spec.sample_prefix);

    let mut keep_indices = Vec::with_capacity(keep.len());
    let mut missing = Vec::new();
    for name in &keep {
        match table.headers.iter().position(|h| h == name) {
            Some(idx) => keep_indices.push(idx),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(OmicsError::ColumnMissing(missing));
    }

    let sample_indices: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(&prefix) && !keep.contains(h))
        .map(|(i, _)| i)
        .collect();
    if sample_indices.is_empty() {
        return Err(OmicsError::ColumnMissing(vec![format!("{prefix}*")]));
    }

    let metadata = table
        .records
        .iter()
        .map(|record| keep_indices.iter().map(|&i| record[i].clone()).collect())
        .collect();

    let mut abundances = Array2::<f64>::zeros((table.nrows(), sample_indices.len()));
    for (row, record) in table.records.iter().enumerate() {
        for (col, &src) in sample_indices.iter().enumerate() {
            abundances[[row, col]] = parse_abundance(&record[src]).ok_or_else(|| {
                OmicsError::parse(
                    &table.source_name,
                    format!(
                        "data row {}, column '{}': invalid abundance '{}'",
                        row + 1,
                        table.headers[src],
                        record[src]
                    ),
                )
            })?;
        }
    }

    debug!(
        "selected {} metadata and {} sample columns",
        keep.len(),
        sample_indices.len()
    );

    Ok(SampleTable {
        metadata_names: keep,
        metadata,
        sample_names: sample_indices
            .iter()
            .map(|&i| table.headers[i].clone())
            .collect(),
        abundances,
    })
}

/// Parse one abundance cell. Missing tokens become `NaN`; negative or non-numeric
/// cells are rejected.
fn parse_abundance(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Some(f64::NAN);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => None,
    }
}

/// Drop rows with more than `max_missing` missing abundance values.
pub fn drop_high_missing(table: &SampleTable, max_missing: usize) -> SampleTable {
    let keep: Vec<usize> = table
        .missing_counts()
        .into_iter()
        .enumerate()
        .filter_map(|(i, count)| if count <= max_missing { Some(i) } else { None })
        .collect();

    info!(
        "missing-value filter (max {}): kept {} of {} rows",
        max_missing,
        keep.len(),
        table.nrows()
    );
    table.take_rows(&keep)
}

/// Apply a table-specific quality filter.
///
/// # Errors
///
/// [`OmicsError::ColumnMissing`] if a column referenced by the predicate is absent.
pub fn apply_quality_predicate(
    table: &SampleTable,
    predicate: &QualityPredicate,
) -> Result<SampleTable> {
    let keep: Vec<usize> = match predicate {
        QualityPredicate::Protein {
            master_column,
            master_value,
            confidence_column,
            max_confidence,
        } => {
            let master = table.require_metadata(master_column)?;
            let confidence = table.require_metadata(confidence_column)?;
            table
                .metadata
                .iter()
                .enumerate()
                .filter(|(_, row)| {
                    row[master] == *master_value
                        && row[confidence]
                            .trim()
                            .parse::<f64>()
                            .is_ok_and(|q| q < *max_confidence)
                })
                .map(|(i, _)| i)
                .collect()
        }
        QualityPredicate::Peptide {
            modification_column,
            marker,
        } => {
            let modification = table.require_metadata(modification_column)?;
            table
                .metadata
                .iter()
                .enumerate()
                .filter(|(_, row)| row[modification].contains(marker.as_str()))
                .map(|(i, _)| i)
                .collect()
        }
    };

    info!(
        "quality filter: kept {} of {} rows",
        keep.len(),
        table.nrows()
    );
    Ok(table.take_rows(&keep))
}

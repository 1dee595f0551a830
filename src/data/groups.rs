//! Sample groups, the two-group design matrix and the log-expression matrix.

use std::collections::HashSet;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::data::annotate::GENE_NAME_COLUMN;
use crate::data::{SampleTable, normalize_column_name};
use crate::error::{OmicsError, Result};

/// A labeled set of sample columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub label: String,
    pub samples: Vec<String>,
}

/// Two compared groups plus samples left out of the comparison (e.g. a reference pool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignment {
    pub group_a: Group,
    pub group_b: Group,
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl GroupAssignment {
    pub fn new<S: Into<String>>(
        label_a: &str,
        samples_a: Vec<S>,
        label_b: &str,
        samples_b: Vec<S>,
    ) -> Self {
        GroupAssignment {
            group_a: Group {
                label: label_a.to_string(),
                samples: samples_a.into_iter().map(Into::into).collect(),
            },
            group_b: Group {
                label: label_b.to_string(),
                samples: samples_b.into_iter().map(Into::into).collect(),
            },
            excluded: Vec::new(),
        }
    }

    pub fn with_excluded<S: Into<String>>(mut self, excluded: Vec<S>) -> Self {
        self.excluded = excluded.into_iter().map(Into::into).collect();
        self
    }

    /// Compared samples, group A first.
    pub fn compared_samples(&self) -> Vec<String> {
        self.group_a
            .samples
            .iter()
            .chain(&self.group_b.samples)
            .map(|s| normalize_column_name(s))
            .collect()
    }

    /// Reject empty groups and samples assigned twice.
    pub fn validate(&self) -> Result<()> {
        if self.group_a.samples.is_empty() || self.group_b.samples.is_empty() {
            return Err(OmicsError::Design(
                "both comparison groups need at least one sample".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        let all = self
            .compared_samples()
            .into_iter()
            .chain(self.excluded.iter().map(|s| normalize_column_name(s)));
        for sample in all {
            if !seen.insert(sample.clone()) {
                return Err(OmicsError::Design(format!(
                    "sample '{sample}' is assigned more than once"
                )));
            }
        }
        Ok(())
    }

    /// Intercept plus an indicator for group A, one row per compared sample.
    pub fn design_matrix(&self) -> Result<DesignMatrix> {
        self.validate()?;
        let n_a = self.group_a.samples.len();
        let samples = self.compared_samples();
        let values = Array2::from_shape_fn((samples.len(), 2), |(i, j)| match j {
            0 => 1.0,
            _ if i < n_a => 1.0,
            _ => 0.0,
        });
        Ok(DesignMatrix {
            coefficient_names: vec!["intercept".to_string(), self.group_a.label.clone()],
            sample_names: samples,
            values,
        })
    }
}

/// Samples x coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub coefficient_names: Vec<String>,
    pub sample_names: Vec<String>,
    pub values: Array2<f64>,
}

impl DesignMatrix {
    pub fn ncoefficients(&self) -> usize {
        self.values.ncols()
    }

    pub fn nsamples(&self) -> usize {
        self.values.nrows()
    }

    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficient_names.iter().position(|c| c == name)
    }
}

/// Uniquely named analytes x samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    pub row_names: Vec<String>,
    pub sample_names: Vec<String>,
    pub values: Array2<f64>,
}

impl ExpressionMatrix {
    pub fn new(row_names: Vec<String>, sample_names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.nrows() != row_names.len() || values.ncols() != sample_names.len() {
            return Err(OmicsError::Design(format!(
                "matrix is {}x{} but {} row and {} sample names were given",
                values.nrows(),
                values.ncols(),
                row_names.len(),
                sample_names.len()
            )));
        }
        Ok(ExpressionMatrix {
            row_names,
            sample_names,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Check that the samples line up with the design rows.
    pub fn check_design(&self, design: &DesignMatrix) -> Result<()> {
        if self.sample_names != design.sample_names {
            return Err(OmicsError::Design(format!(
                "matrix samples {:?} do not match design samples {:?}",
                self.sample_names, design.sample_names
            )));
        }
        Ok(())
    }
}

/// Build the natural-log expression matrix of the compared samples.
///
/// Rows are named by `gene_name`, which must already be unique (see
/// [`crate::data::annotate::distinct_by_gene`]). Non-positive abundances have no
/// logarithm and become missing.
pub fn log_expression_matrix(
    table: &SampleTable,
    groups: &GroupAssignment,
) -> Result<ExpressionMatrix> {
    groups.validate()?;
    let samples = groups.compared_samples();
    let indices = table.require_samples(&samples)?;

    let row_names: Vec<String> = table
        .metadata_column(GENE_NAME_COLUMN)?
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let mut seen = HashSet::with_capacity(row_names.len());
    if let Some(duplicate) = row_names.iter().find(|n| !seen.insert(n.as_str())) {
        return Err(OmicsError::Design(format!(
            "gene name '{duplicate}' is not unique; deduplicate rows first"
        )));
    }

    let values = table
        .abundances
        .select(Axis(1), &indices)
        .mapv(|v| if v > 0.0 { v.ln() } else { f64::NAN });

    ExpressionMatrix::new(row_names, samples, values)
}

//! Tabular containers and the data-preparation stages.
//!
//! A run moves through three shapes:
//!
//! - [`RawTable`]: normalized headers and string cells exactly as read from disk
//! - [`SampleTable`]: selected metadata columns plus numeric abundance columns
//! - [`groups::ExpressionMatrix`]: uniquely named rows of log abundances restricted to
//!   the compared samples, ready for the statistical tests
//!
//! Each stage function takes a table and returns a new one.

use ndarray::{Array2, Axis};

use crate::error::{OmicsError, Result};

pub mod annotate;
pub mod filter;
pub mod groups;
pub mod loader;
pub mod normalize;

/// A delimited table after header normalization, all cells kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// File path, or `<reader>` for in-memory input; used in error messages
    pub source_name: String,
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn nrows(&self) -> usize {
        self.records.len()
    }

    pub fn ncols(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = normalize_column_name(name);
        self.headers.iter().position(|h| *h == name)
    }

    /// Iterate over the cells of one column.
    pub fn column<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a str> + 'a> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| OmicsError::ColumnMissing(vec![normalize_column_name(name)]))?;
        Ok(self.records.iter().map(move |r| r[idx].as_str()))
    }
}

/// Analytes x samples, with per-row text metadata.
///
/// `abundances` has one row per analyte and one column per sample; missing values are
/// stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    pub metadata_names: Vec<String>,
    pub metadata: Vec<Vec<String>>,
    pub sample_names: Vec<String>,
    pub abundances: Array2<f64>,
}

impl SampleTable {
    pub fn nrows(&self) -> usize {
        self.metadata.len()
    }

    pub fn nsamples(&self) -> usize {
        self.sample_names.len()
    }

    pub fn metadata_index(&self, name: &str) -> Option<usize> {
        let name = normalize_column_name(name);
        self.metadata_names.iter().position(|h| *h == name)
    }

    pub fn sample_index(&self, name: &str) -> Option<usize> {
        let name = normalize_column_name(name);
        self.sample_names.iter().position(|h| *h == name)
    }

    pub(crate) fn require_metadata(&self, name: &str) -> Result<usize> {
        self.metadata_index(name)
            .ok_or_else(|| OmicsError::ColumnMissing(vec![normalize_column_name(name)]))
    }

    /// Resolve sample names to column indices, reporting every unknown name at once.
    pub(crate) fn require_samples<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.sample_index(name.as_ref()) {
                Some(idx) => indices.push(idx),
                None => missing.push(normalize_column_name(name.as_ref())),
            }
        }
        if missing.is_empty() {
            Ok(indices)
        } else {
            Err(OmicsError::ColumnMissing(missing))
        }
    }

    /// Cells of one metadata column in row order.
    pub fn metadata_column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.require_metadata(name)?;
        Ok(self.metadata.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Number of missing abundance values per row.
    pub fn missing_counts(&self) -> Vec<usize> {
        self.abundances
            .axis_iter(Axis(0))
            .map(|row| row.iter().filter(|v| v.is_nan()).count())
            .collect()
    }

    /// Keep the rows at `indices` (in the given order).
    pub(crate) fn take_rows(&self, indices: &[usize]) -> SampleTable {
        SampleTable {
            metadata_names: self.metadata_names.clone(),
            metadata: indices.iter().map(|&i| self.metadata[i].clone()).collect(),
            sample_names: self.sample_names.clone(),
            abundances: self.abundances.select(Axis(0), indices),
        }
    }

    /// Insert a metadata column at `position`.
    pub(crate) fn with_metadata_column(
        mut self,
        position: usize,
        name: &str,
        values: Vec<String>,
    ) -> SampleTable {
        let name = normalize_column_name(name);
        if let Some(existing) = self.metadata_names.iter().position(|h| *h == name) {
            self.metadata_names.remove(existing);
            for row in self.metadata.iter_mut() {
                row.remove(existing);
            }
        }
        let position = position.min(self.metadata_names.len());
        self.metadata_names.insert(position, name);
        for (row, value) in self.metadata.iter_mut().zip(values) {
            row.insert(position, value);
        }
        self
    }
}

/// Normalize a free-form column header.
///
/// Lowercase ASCII, `%` becomes `percent`, `#` becomes `number`, every run of other
/// non-alphanumeric characters becomes a single `_`, and leading/trailing
/// underscores are trimmed.
pub fn normalize_column_name(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in name.chars() {
        match ch {
            c if c.is_ascii_alphanumeric() => current.push(c.to_ascii_lowercase()),
            '%' | '#' => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                words.push(if ch == '%' { "percent" } else { "number" }.to_string());
            }
            _ => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.join("_")
}

/// Normalize a header row and make repeated names unique with `_2`, `_3`, ... suffixes.
pub fn normalize_headers<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let base = normalize_column_name(header.as_ref());
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        seen.push(candidate);
    }
    seen
}

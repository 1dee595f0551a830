//! Tab-separated table loading.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::data::{RawTable, normalize_headers};
use crate::error::{OmicsError, Result};

/// Load a tab-separated file with a header row.
///
/// Headers are normalized with [`crate::data::normalize_column_name`]. Fails with
/// [`OmicsError::Parse`] if the file cannot be opened, has no header or no data rows,
/// or if any row has a different number of fields than the header.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let file = File::open(path)
        .map_err(|e| OmicsError::parse(&source_name, format!("cannot open file: {e}")))?;
    read_table(BufReader::new(file), &source_name)
}

impl RawTable {
    /// Parse a tab-separated table from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<RawTable> {
        read_table(reader, "<reader>")
    }
}

fn read_table<R: Read>(reader: R, source_name: &str) -> Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let raw_headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| OmicsError::parse(source_name, e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.is_empty()) {
        return Err(OmicsError::parse(source_name, "empty input, no header row"));
    }

    let headers = normalize_headers(&raw_headers);

    let mut records = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| {
            OmicsError::parse(source_name, format!("data row {}: {e}", i + 1))
        })?;
        records.push(record.iter().map(|c| c.to_string()).collect::<Vec<_>>());
    }

    if records.is_empty() {
        return Err(OmicsError::parse(source_name, "header row without data rows"));
    }

    debug!(
        "loaded {}: {} rows x {} columns",
        source_name,
        records.len(),
        headers.len()
    );

    Ok(RawTable {
        source_name: source_name.to_string(),
        headers,
        records,
    })
}

//! Gene-name annotation and reference-set membership flags.

use std::collections::HashSet;

use log::{debug, warn};

use crate::data::{RawTable, SampleTable};
use crate::error::Result;

pub const GENE_NAME_COLUMN: &str = "gene_name";

const GENE_MARKER: &str = "GN=";
const EVIDENCE_MARKER: &str = "PE=";

/// Extract the gene name from a UniProt-style description.
///
/// Takes the text between `GN=` and the following `PE=` (or the end of the text when
/// `PE=` is absent) and removes all whitespace. Returns an empty string when `GN=` is
/// absent.
///
/// ```
/// use omics_statistics::data::annotate::extract_gene_name;
///
/// let description = "Stromal interaction molecule 1 OS=Mus musculus OX=10090 GN=Stim1 PE=1 SV=1";
/// assert_eq!(extract_gene_name(description), "Stim1");
/// assert_eq!(extract_gene_name("no markers here"), "");
/// ```
pub fn extract_gene_name(description: &str) -> String {
    let Some((_, after_gene)) = description.split_once(GENE_MARKER) else {
        return String::new();
    };
    let gene = match after_gene.split_once(EVIDENCE_MARKER) {
        Some((gene, _)) => gene,
        None => after_gene,
    };
    gene.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Prepend a `gene_name` column derived from `description_column`.
pub fn annotate_gene_names(table: SampleTable, description_column: &str) -> Result<SampleTable> {
    let names: Vec<String> = table
        .metadata_column(description_column)?
        .into_iter()
        .map(extract_gene_name)
        .collect();

    let unnamed = names.iter().filter(|n| n.is_empty()).count();
    if unnamed > 0 {
        warn!("{unnamed} row(s) have no GN= entry in '{description_column}'");
    }

    Ok(table.with_metadata_column(0, GENE_NAME_COLUMN, names))
}

/// Keep the first row for every gene name, in original row order.
///
/// Rows with an empty gene name are treated as one more key, so at most one of them
/// survives.
pub fn distinct_by_gene(table: &SampleTable) -> Result<SampleTable> {
    let names = table.metadata_column(GENE_NAME_COLUMN)?;
    let mut seen = HashSet::with_capacity(names.len());
    let keep: Vec<usize> = names
        .iter()
        .enumerate()
        .filter_map(|(i, name)| if seen.insert(*name) { Some(i) } else { None })
        .collect();

    if keep.len() < table.nrows() {
        debug!(
            "dropped {} duplicate gene name row(s)",
            table.nrows() - keep.len()
        );
    }
    Ok(table.take_rows(&keep))
}

/// Collect the non-empty values of one column of a reference table, such as the
/// gene symbols of a mitochondrial inventory.
pub fn reference_gene_set(reference: &RawTable, column: &str) -> Result<HashSet<String>> {
    Ok(reference
        .column(column)?
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .collect())
}

/// Append a `true`/`false` metadata column marking rows whose gene name is in `genes`.
pub fn flag_membership(
    table: SampleTable,
    genes: &HashSet<String>,
    column_name: &str,
) -> Result<SampleTable> {
    let flags: Vec<String> = table
        .metadata_column(GENE_NAME_COLUMN)?
        .into_iter()
        .map(|name| (!name.is_empty() && genes.contains(name)).to_string())
        .collect();
    let position = table.metadata_names.len();
    Ok(table.with_metadata_column(position, column_name, flags))
}

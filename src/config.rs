//! Explicit column and threshold configuration for the pipeline stages.
//!
//! Every stage takes its parameters explicitly; [`PipelineConfig`] only bundles them so
//! that an experiment can be described once, either in code or in a TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::groups::GroupAssignment;
use crate::error::{OmicsError, Result};
use crate::testing::AdjustMethod;

/// Channels of the reference TMT 11-plex experiment, in acquisition order.
const TMT11_CHANNELS: [&str; 11] = [
    "126", "127n", "127c", "128n", "128c", "129n", "129c", "130n", "130c", "131n", "131c",
];

fn protein_channel(channel: &str) -> String {
    format!("abundance_f1_{channel}_sample")
}

/// Which columns survive `select_columns`.
///
/// `keep` lists metadata columns by name; `sample_prefix` selects the abundance
/// columns. Both are compared after header normalization, so raw export names such as
/// `"Exp. q-value: Combined"` may be used directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub keep: Vec<String>,
    pub sample_prefix: String,
}

impl ColumnSpec {
    pub fn new<S: AsRef<str>>(keep: &[S], sample_prefix: &str) -> Self {
        ColumnSpec {
            keep: keep.iter().map(|k| k.as_ref().to_string()).collect(),
            sample_prefix: sample_prefix.to_string(),
        }
    }

    /// Protein table of a Proteome Discoverer export.
    pub fn protein_default() -> Self {
        ColumnSpec::new(
            &[
                "master",
                "exp_q_value_combined",
                "accession",
                "description",
                "number_of_peptides",
            ],
            "abundance_f",
        )
    }

    /// Peptide group table of a Proteome Discoverer export.
    pub fn peptide_default() -> Self {
        ColumnSpec::new(
            &[
                "annotated_sequence",
                "modifications",
                "master_protein_accessions",
            ],
            "abundances_normalized_f",
        )
    }
}

/// Table-specific row filter applied after the missing-value filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityPredicate {
    /// Keep representative proteins whose combined q-value is below `max_confidence`.
    Protein {
        master_column: String,
        master_value: String,
        confidence_column: String,
        max_confidence: f64,
    },
    /// Keep peptides whose modification text contains `marker` (case-sensitive).
    Peptide {
        modification_column: String,
        marker: String,
    },
}

impl QualityPredicate {
    pub fn protein_default() -> Self {
        QualityPredicate::Protein {
            master_column: "master".to_string(),
            master_value: "IsMasterProtein".to_string(),
            confidence_column: "exp_q_value_combined".to_string(),
            max_confidence: 0.01,
        }
    }

    pub fn peptide_default() -> Self {
        QualityPredicate::Peptide {
            modification_column: "modifications".to_string(),
            marker: "Phospho".to_string(),
        }
    }
}

fn default_max_missing() -> usize {
    5
}

fn default_confidence_level() -> f64 {
    0.95
}

fn default_description_column() -> String {
    "description".to_string()
}

/// Full description of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub proteins: ColumnSpec,
    pub peptides: ColumnSpec,
    pub protein_quality: QualityPredicate,
    pub peptide_quality: QualityPredicate,
    /// Rows with more missing abundances than this are dropped.
    pub max_missing: usize,
    pub description_column: String,
    pub groups: GroupAssignment,
    pub adjust_method: AdjustMethod,
    pub confidence_level: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let channels: Vec<String> = TMT11_CHANNELS.iter().map(|c| protein_channel(c)).collect();
        PipelineConfig {
            proteins: ColumnSpec::protein_default(),
            peptides: ColumnSpec::peptide_default(),
            protein_quality: QualityPredicate::protein_default(),
            peptide_quality: QualityPredicate::peptide_default(),
            max_missing: default_max_missing(),
            description_column: default_description_column(),
            groups: GroupAssignment::new(
                "KO",
                channels[0..5].to_vec(),
                "WT",
                channels[5..10].to_vec(),
            )
            .with_excluded(channels[10..].to_vec()),
            adjust_method: AdjustMethod::default(),
            confidence_level: default_confidence_level(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OmicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

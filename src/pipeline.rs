//! End-to-end runs of the protein and peptide stages.
//!
//! Every intermediate table is returned so callers can inspect or export any stage.

use std::path::Path;

use log::info;

use crate::config::PipelineConfig;
use crate::data::annotate::{annotate_gene_names, distinct_by_gene};
use crate::data::filter::{apply_quality_predicate, drop_high_missing, select_columns};
use crate::data::groups::{DesignMatrix, ExpressionMatrix, log_expression_matrix};
use crate::data::loader::load_table;
use crate::data::normalize::normalize;
use crate::data::SampleTable;
use crate::error::Result;
use crate::testing::inference::{DifferentialAbundance, TestOptions};
use crate::testing::RankedResults;

/// Artifacts of [`run_protein_pipeline`], in stage order.
#[derive(Debug, Clone)]
pub struct ProteinPipelineOutput {
    /// Allow-listed metadata plus abundance columns
    pub selected: SampleTable,
    /// After the missing-value and quality filters
    pub filtered: SampleTable,
    /// With a leading `gene_name` column, one row per gene
    pub annotated: SampleTable,
    /// Compared samples rescaled to equal totals
    pub normalized: SampleTable,
    pub matrix: ExpressionMatrix,
    pub design: DesignMatrix,
    pub results: RankedResults,
}

/// Artifacts of [`run_peptide_filter`].
#[derive(Debug, Clone)]
pub struct PeptidePipelineOutput {
    pub selected: SampleTable,
    pub filtered: SampleTable,
}

/// Load a protein table and run it through every stage up to the ranked moderated
/// t-test of group A against group B.
pub fn run_protein_pipeline<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
) -> Result<ProteinPipelineOutput> {
    let design = config.groups.design_matrix()?;

    let raw = load_table(path)?;
    let selected = select_columns(&raw, &config.proteins)?;
    let filtered = apply_quality_predicate(
        &drop_high_missing(&selected, config.max_missing),
        &config.protein_quality,
    )?;

    let annotated = distinct_by_gene(&annotate_gene_names(
        filtered.clone(),
        &config.description_column,
    )?)?;
    let normalized = normalize(&annotated, &config.groups.compared_samples())?;
    let matrix = log_expression_matrix(&normalized, &config.groups)?;

    let options = TestOptions {
        adjust_method: config.adjust_method,
        confidence_level: config.confidence_level,
    };
    let results = matrix.moderated_t_test(&design, &config.groups.group_a.label, &options)?;
    info!(
        "protein pipeline: {} tested, {} excluded, {} with adjusted p < 0.05",
        results.len(),
        results.excluded_count(),
        results.num_significant(0.05)
    );

    Ok(ProteinPipelineOutput {
        selected,
        filtered,
        annotated,
        normalized,
        matrix,
        design,
        results,
    })
}

/// Load a peptide table and apply column selection plus the missing-value and
/// modification filters.
pub fn run_peptide_filter<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
) -> Result<PeptidePipelineOutput> {
    let raw = load_table(path)?;
    let selected = select_columns(&raw, &config.peptides)?;
    let filtered = apply_quality_predicate(
        &drop_high_missing(&selected, config.max_missing),
        &config.peptide_quality,
    )?;
    info!(
        "peptide filter: kept {} of {} rows",
        filtered.nrows(),
        selected.nrows()
    );

    Ok(PeptidePipelineOutput { selected, filtered })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OmicsError;
    use std::io::Write;

    #[test]
    fn test_peptide_filter() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "Annotated Sequence\tModifications\tMaster Protein Accessions\tAbundances (Normalized): F1: 126, Sample\tAbundances (Normalized): F1: 127N, Sample"
        )
        .unwrap();
        writeln!(file, "[K].AsPEK.[L]\t1xPhospho [S3]\tP1\t10\t12").unwrap();
        writeln!(file, "[K].LLMK.[A]\t1xOxidation [M3]\tP2\t5\t6").unwrap();
        writeln!(file, "[R].SSYR.[G]\t1xPhospho [S1]\tP3\t\t").unwrap();
        file.flush().unwrap();

        let config = PipelineConfig {
            max_missing: 1,
            ..PipelineConfig::default()
        };
        let output = run_peptide_filter(file.path(), &config).unwrap();
        assert_eq!(output.selected.nrows(), 3);
        assert_eq!(output.selected.nsamples(), 2);
        assert_eq!(output.filtered.nrows(), 1);
        assert_eq!(output.filtered.metadata[0][2], "P1");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = run_protein_pipeline("/nonexistent/proteins.txt", &PipelineConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_groups_fail_before_loading() {
        let mut config = PipelineConfig::default();
        config.groups.group_b.samples.clear();
        assert!(matches!(
            run_protein_pipeline("/nonexistent/proteins.txt", &config),
            Err(OmicsError::Design(_))
        ));
    }
}

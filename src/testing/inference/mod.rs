use crate::data::groups::{DesignMatrix, ExpressionMatrix};
use crate::error::{OmicsError, Result};
use crate::testing::{AdjustMethod, RankedResults, TTestType, TestMethod};

pub mod linear_model;

pub mod moderated;

pub mod parametric;

/// Options shared by all tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOptions {
    pub adjust_method: AdjustMethod,
    /// Coverage of the effect-size confidence intervals
    pub confidence_level: f64,
}

impl Default for TestOptions {
    fn default() -> Self {
        TestOptions {
            adjust_method: AdjustMethod::BenjaminiHochberg,
            confidence_level: 0.95,
        }
    }
}

pub trait DifferentialAbundance {
    /// Moderated t-test of the named design coefficient.
    fn moderated_t_test(
        &self,
        design: &DesignMatrix,
        coefficient: &str,
        options: &TestOptions,
    ) -> Result<RankedResults>;

    /// Ordinary two-sample t-test between the given sample columns.
    fn t_test(
        &self,
        group1_indices: &[usize],
        group2_indices: &[usize],
        test_type: TTestType,
        options: &TestOptions,
    ) -> Result<RankedResults>;

    /// Compare the samples flagged by a two-group design coefficient against the rest.
    fn differential_abundance(
        &self,
        design: &DesignMatrix,
        coefficient: &str,
        test_method: TestMethod,
        options: &TestOptions,
    ) -> Result<RankedResults>;
}

impl DifferentialAbundance for ExpressionMatrix {
    fn moderated_t_test(
        &self,
        design: &DesignMatrix,
        coefficient: &str,
        options: &TestOptions,
    ) -> Result<RankedResults> {
        let index = coefficient_index(design, coefficient)?;
        moderated::moderated_t_test(self, design, index, options)
    }

    fn t_test(
        &self,
        group1_indices: &[usize],
        group2_indices: &[usize],
        test_type: TTestType,
        options: &TestOptions,
    ) -> Result<RankedResults> {
        let ncols = self.sample_names.len();
        if let Some(&bad) = group1_indices
            .iter()
            .chain(group2_indices)
            .find(|&&i| i >= ncols)
        {
            return Err(OmicsError::Design(format!(
                "sample index {bad} out of range for {ncols} sample(s)"
            )));
        }

        let (results, excluded) =
            parametric::t_test_matrix_groups(self, group1_indices, group2_indices, test_type, options)?;
        if results.is_empty() {
            return Err(OmicsError::Fit {
                excluded: excluded.len(),
            });
        }
        Ok(RankedResults::rank(
            results,
            excluded,
            TestMethod::TTest(test_type),
            options.adjust_method,
            None,
        )?)
    }

    fn differential_abundance(
        &self,
        design: &DesignMatrix,
        coefficient: &str,
        test_method: TestMethod,
        options: &TestOptions,
    ) -> Result<RankedResults> {
        match test_method {
            TestMethod::Moderated => self.moderated_t_test(design, coefficient, options),
            TestMethod::TTest(test_type) => {
                self.check_design(design)?;
                let index = coefficient_index(design, coefficient)?;
                let column = design.values.column(index);
                if column.iter().any(|&v| v != 0.0 && v != 1.0) {
                    return Err(OmicsError::Design(format!(
                        "coefficient '{coefficient}' is not a group indicator"
                    )));
                }
                let (group1, group2): (Vec<usize>, Vec<usize>) =
                    (0..column.len()).partition(|&i| column[i] == 1.0);
                self.t_test(&group1, &group2, test_type, options)
            }
        }
    }
}

fn coefficient_index(design: &DesignMatrix, coefficient: &str) -> Result<usize> {
    design.coefficient_index(coefficient).ok_or_else(|| {
        OmicsError::Design(format!(
            "unknown coefficient '{coefficient}', expected one of {:?}",
            design.coefficient_names
        ))
    })
}

use serde::{Deserialize, Serialize};

pub mod correction;
pub mod effect;
pub mod inference;

pub mod utils;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestMethod {
    /// Linear model with empirical-Bayes moderated variances
    Moderated,
    /// Ordinary per-row two-sample t-test
    TTest(TTestType),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TTestType {
    Student, // Equal variance
    Welch,   // Unequal variance
}

/// Multiple testing correction applied across all fitted rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustMethod {
    #[default]
    BenjaminiHochberg,
    BenjaminiYekutieli,
    Bonferroni,
    Holm,
    Hochberg,
    None,
}

/// Statistics for one analyte.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Row index in the tested matrix
    pub row: usize,
    /// Row name, usually the gene name
    pub name: String,
    /// The test statistic value (moderated or ordinary t)
    pub statistic: f64,
    /// The p-value of the test
    pub p_value: f64,
    /// Multiple-testing adjusted p-value
    pub adjusted_p_value: f64,
    /// Contrast estimate: difference of group means on the natural-log scale
    pub effect_size: f64,
    /// Mean of the non-missing log values of the row
    pub average_expression: f64,
    /// Degrees of freedom used for the p-value
    pub degrees_of_freedom: f64,
    /// Standard error of the effect size
    pub standard_error: f64,
    /// Confidence interval for the effect size
    pub confidence_interval: Option<(f64, f64)>,
}

impl TestResult {
    /// Create a new test result with minimal information
    pub fn new(row: usize, name: &str, statistic: f64, p_value: f64) -> Self {
        TestResult {
            row,
            name: name.to_string(),
            statistic,
            p_value,
            adjusted_p_value: p_value,
            effect_size: f64::NAN,
            average_expression: f64::NAN,
            degrees_of_freedom: f64::NAN,
            standard_error: f64::NAN,
            confidence_interval: None,
        }
    }

    /// Add the effect size and its standard error
    pub fn with_effect_size(mut self, effect_size: f64, standard_error: f64) -> Self {
        self.effect_size = effect_size;
        self.standard_error = standard_error;
        self
    }

    /// Add degrees of freedom to the result
    pub fn with_degrees_of_freedom(mut self, df: f64) -> Self {
        self.degrees_of_freedom = df;
        self
    }

    pub fn with_average_expression(mut self, average: f64) -> Self {
        self.average_expression = average;
        self
    }

    /// Add confidence interval to the result
    pub fn with_confidence_interval(mut self, lower: f64, upper: f64) -> Self {
        self.confidence_interval = Some((lower, upper));
        self
    }

    /// Effect size converted from natural log to log2 fold change
    pub fn log2_fold_change(&self) -> f64 {
        effect::log2_fold_change(self.effect_size)
    }

    /// Check if the result is statistically significant at the given threshold
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.adjusted_p_value < alpha
    }
}

/// Why a row could not be tested.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitFailure {
    #[error("{observed} non-missing value(s) for {required} coefficient(s)")]
    InsufficientObservations { observed: usize, required: usize },
    #[error("design is singular for the observed samples")]
    SingularDesign,
    #[error("no residual degrees of freedom and no variance prior to borrow from")]
    NoResidualDegreesOfFreedom,
}

/// A row excluded from the results.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("row {row} ({name}): {reason}")]
pub struct FitError {
    pub row: usize,
    pub name: String,
    pub reason: FitFailure,
}

/// Prior for the per-row residual variances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior degrees of freedom, infinite when the variances show no excess spread
    pub df_prior: f64,
    /// Prior variance
    pub var_prior: f64,
}

/// Results ranked by ascending adjusted p-value, plus the rows that were excluded.
#[derive(Debug, Clone)]
pub struct RankedResults {
    pub results: Vec<TestResult>,
    pub excluded: Vec<FitError>,
    pub method: TestMethod,
    pub adjust_method: AdjustMethod,
    /// Set for the moderated test
    pub prior: Option<VariancePrior>,
}

impl RankedResults {
    /// Adjust the p-values of `results` and sort them.
    ///
    /// Results are ordered by ascending adjusted p-value; ties keep row order.
    pub(crate) fn rank(
        mut results: Vec<TestResult>,
        excluded: Vec<FitError>,
        method: TestMethod,
        adjust_method: AdjustMethod,
        prior: Option<VariancePrior>,
    ) -> anyhow::Result<Self> {
        if !results.is_empty() {
            let p_values: Vec<f64> = results.iter().map(|r| r.p_value).collect();
            let adjusted = correction::adjust_p_values(&p_values, adjust_method)?;
            for (result, adj) in results.iter_mut().zip(adjusted) {
                result.adjusted_p_value = adj;
            }
        }
        results.sort_by(|a, b| {
            a.adjusted_p_value
                .total_cmp(&b.adjusted_p_value)
                .then(a.row.cmp(&b.row))
        });

        Ok(RankedResults {
            results,
            excluded,
            method,
            adjust_method,
            prior,
        })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of rows that could not be tested.
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    /// Results with an adjusted p-value below `alpha`, in rank order.
    pub fn significant(&self, alpha: f64) -> Vec<&TestResult> {
        self.results
            .iter()
            .take_while(|r| r.adjusted_p_value < alpha)
            .collect()
    }

    /// Get the number of significant features at the given threshold
    pub fn num_significant(&self, alpha: f64) -> usize {
        self.significant(alpha).len()
    }

    /// Top n results by adjusted p-value
    pub fn top(&self, n: usize) -> &[TestResult] {
        &self.results[..n.min(self.results.len())]
    }

    pub fn get(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

use std::path::PathBuf;

/// Errors raised by the pipeline stages.
///
/// Every variant aborts the stage that produced it. Row-level model failures are
/// not errors: they are collected as [`crate::testing::FitError`] records in the
/// ranked results.
#[derive(Debug, thiserror::Error)]
pub enum OmicsError {
    /// Malformed, missing or empty input
    #[error("parse error in {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// One or more expected columns are absent after header normalization
    #[error("missing column(s): {}", .0.join(", "))]
    ColumnMissing(Vec<String>),

    /// A sample column cannot be rescaled
    #[error("cannot normalize column '{column}': column sum is {sum}")]
    Normalization { column: String, sum: f64 },

    /// Design matrix and data disagree
    #[error("design error: {0}")]
    Design(String),

    /// No row could be fitted
    #[error("model fit failed for all {excluded} row(s)")]
    Fit { excluded: usize },

    /// Invalid TOML configuration
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O error outside of table parsing
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OmicsError {
    pub(crate) fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        OmicsError::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OmicsError>;

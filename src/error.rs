//! Error type shared by every pipeline stage.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is absent from a record or file.
    #[error("missing column `{column}`")]
    MissingColumn { column: String },

    /// A column holds a value of the wrong kind.
    #[error("invalid value in column `{column}` at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        reason: String,
    },

    /// Two inputs that must agree in length do not.
    #[error("shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// Matrix width does not match the model's feature space.
    #[error("feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },

    /// Matrix or vectorizer was produced by a different feature space than the model.
    #[error("feature space mismatch: model trained on {expected}, got {got}")]
    FeatureSpaceMismatch { expected: String, got: String },

    /// Transform requested without a fitted vectorizer.
    #[error("not fitted: {0}")]
    NotFitted(String),

    /// Empty data provided where non-empty was required.
    #[error("empty data: {0}")]
    EmptyData(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Numerical computation error (non-finite input, breakdown).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be read or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Run registry lookup or bookkeeping failed.
    #[error("registry error: {0}")]
    Registry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn missing_column(column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            column: column.into(),
        }
    }

    pub(crate) fn invalid_value(column: &str, row: usize, reason: impl Into<String>) -> Self {
        PipelineError::InvalidValue {
            column: column.to_string(),
            row,
            reason: reason.into(),
        }
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

//! Error kinds
//!
//! Request-fatal failures are `PipelineError`. Weight acquisition and advisory
//! text failures have their own types because the orchestrator absorbs them
//! (uniform weights, omitted advisory) instead of aborting the request.

use thiserror::Error;

/// Failures that end a pipeline request with a single error emission
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Column '{0}' not found in dataset.")]
    ColumnNotFound(String),

    #[error("Dataset unavailable: {0}")]
    DataUnavailable(#[from] DatasetError),

    #[error("Prediction sequence for '{mineral}' has {actual} points, scoring needs {required}")]
    InsufficientPredictions {
        mineral: String,
        required: usize,
        actual: usize,
    },

    #[error("Column '{0}' has no numeric values")]
    InsufficientData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Dataset fetch failures (fatal to the request, never retried automatically)
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("malformed dataset: {0}")]
    Malformed(String),
}

/// Regression fit/predict failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature rows ({rows}) and targets ({targets}) differ in length")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("numerical error: {0}")]
    Numerical(String),
}

/// Weight acquisition failures; the caller substitutes uniform weights
#[derive(Debug, Error)]
pub enum WeightError {
    #[error("weight source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed weight response: {0}")]
    Malformed(String),
}

/// Advisory text failures; the advisory emission is omitted
#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("advisory service unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

//! Error types for the demand_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Series too short for the requested model
    #[error("Insufficient history: need at least {required} observations, got {actual}")]
    InsufficientHistory {
        /// Minimum number of observations required
        required: usize,
        /// Number of observations actually available
        actual: usize,
    },

    /// Numerical failure while fitting a model
    #[error("Model fit error: {0}")]
    ModelFitError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Referenced scenario does not exist
    #[error("Scenario not found: {0}")]
    NotFound(String),

    /// Comparison requested with too few scenarios
    #[error("Insufficient selection: comparison requires at least {required} scenarios, got {actual}")]
    InsufficientSelection {
        /// Minimum number of scenarios required
        required: usize,
        /// Number of scenarios actually selected
        actual: usize,
    },

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error serializing or deserializing scenario data
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

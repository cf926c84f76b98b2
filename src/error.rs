//! Error types for the forecasting pipeline.
//!
//! Indicator, windowing, training and evaluation failures surface unchanged to
//! the orchestrator, which turns them into JSON error payloads.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur anywhere between raw observations and a prediction.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Not enough history for indicators, windowing or inference.
    #[error("Insufficient data: need at least {required} rows, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Inference attempted before any model was trained.
    #[error("No trained model found: {0}")]
    ModelNotFound(String),

    /// Numerical failure while fitting.
    #[error("Training failed: {0}")]
    Training(String),

    /// Degenerate evaluation input.
    #[error("Metric undefined: {0}")]
    MetricUndefined(String),

    /// Malformed caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Price feed request or payload failure.
    #[error("Price feed error: {0}")]
    Feed(String),

    /// Historical price store failure.
    #[error("Price store error: {0}")]
    Store(String),

    /// Model weights could not be recorded or loaded.
    #[error("Model record error: {0}")]
    Record(String),

    /// A blocking pipeline task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn insufficient(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }
}

impl From<burn::record::RecorderError> for PipelineError {
    fn from(err: burn::record::RecorderError) -> Self {
        Self::Record(format!("{:?}", err))
    }
}

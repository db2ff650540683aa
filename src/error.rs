//! Unified error types for training and serving.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Unified error type for the trainer and the server.
#[derive(Error, Debug)]
pub enum AppError {
    /// Dataset loading or splitting error.
    #[error("data error: {0}")]
    Data(#[from] DataError),

    /// Model fitting, inference or artifact error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Experiment log error.
    #[error("tracking error: {0}")]
    Tracking(#[from] TrackingError),
}

/// Dataset errors.
#[derive(Error, Debug)]
pub enum DataError {
    /// A CSV line could not be parsed.
    #[error("line {line}: {reason}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },

    /// A row's width differs from the first row.
    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedRow {
        /// 0-based row index.
        row: usize,
        /// Width of the first row.
        expected: usize,
        /// Width of the offending row.
        actual: usize,
    },

    /// Dataset has no rows.
    #[error("dataset is empty")]
    Empty,

    /// Requested split leaves one side empty.
    #[error("invalid test size {test_size} for {rows} rows")]
    InvalidSplit {
        /// Requested test fraction.
        test_size: f64,
        /// Row count.
        rows: usize,
    },
}

/// Model errors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Hyperparameters or training data are unusable.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Input row width differs from the trained width.
    #[error("expected {expected} features, got {actual}")]
    FeatureMismatch {
        /// Width the model was trained on.
        expected: usize,
        /// Width of the input row.
        actual: usize,
    },

    /// Input contains NaN or infinity.
    #[error("feature {index} is not a finite number")]
    NonFinite {
        /// Position of the offending value.
        index: usize,
    },

    /// Artifact file could not be read or written.
    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact contents are not a valid model.
    #[error("corrupt artifact: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Artifact parses but its parts disagree with each other.
    #[error("incompatible artifact: {0}")]
    Incompatible(String),
}

/// Experiment log errors.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// Filesystem error under the tracking root.
    #[error("tracking io error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata file could not be parsed or written.
    #[error("tracking metadata error: {0}")]
    Json(#[from] serde_json::Error),

    /// No experiment directory with this id.
    #[error("unknown experiment {0:?}")]
    UnknownExperiment(String),

    /// Param or metric key is not a safe file name.
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// Param was already logged for this run.
    #[error("param {0:?} already logged")]
    DuplicateParam(String),

    /// Model artifact could not be written into the run.
    #[error("artifact error: {0}")]
    Artifact(#[from] ModelError),
}

/// Errors raised while handling a prediction request.
#[derive(Error, Debug)]
pub enum PredictError {
    /// Body is not a JSON object with a numeric `features` field.
    #[error("{0}")]
    MalformedInput(String),

    /// Model rejected the rows.
    #[error("{0}")]
    Inference(#[from] ModelError),
}

impl PredictError {
    /// HTTP status reported for this error.
    ///
    /// Both kinds currently map to 500, matching the behavior clients
    /// already depend on.
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MalformedInput(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PredictError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::MalformedInput(_) => "malformed_input",
            PredictError::Inference(_) => "inference",
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

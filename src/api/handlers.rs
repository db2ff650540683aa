//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PredictError;
use crate::metrics::{PredictionMetrics, CONTENT_TYPE_LATEST};
use crate::model::Classifier;

use super::features::parse_request;

/// Greeting served on `/`.
pub const WELCOME_MESSAGE: &str = "Welcome to the LightGBM Classification API!";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded model, read-only for the life of the process.
    pub model: Arc<dyn Classifier>,
    /// Prediction counters and latency histogram.
    pub metrics: PredictionMetrics,
}

impl AppState {
    /// Create new app state.
    pub fn new(model: Arc<dyn Classifier>, metrics: PredictionMetrics) -> Self {
        Self { model, metrics }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("n_features", &self.model.n_features())
            .field("classes", &self.model.classes())
            .finish_non_exhaustive()
    }
}

/// Successful prediction response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    /// One label per input row, in input order.
    pub predictions: Vec<u32>,
}

/// Welcome handler - always returns 200.
pub async fn welcome() -> &'static str {
    WELCOME_MESSAGE
}

/// Prediction handler - 200 with labels, 500 with `{"error": ...}` otherwise.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Response {
    let _timer = state.metrics.timer();

    match run_prediction(state.model.as_ref(), &body) {
        Ok(predictions) => {
            state.metrics.inc_success();
            debug!(rows = predictions.len(), "Prediction served");
            (StatusCode::OK, Json(PredictResponse { predictions })).into_response()
        }
        Err(e) => {
            state.metrics.inc_error();
            warn!(kind = e.kind(), error = %e, "Prediction failed");
            e.into_response()
        }
    }
}

/// Metrics handler - Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE_LATEST)],
        state.metrics.render(),
    )
}

/// Decode the body and run the model over every row.
pub fn run_prediction(model: &dyn Classifier, body: &[u8]) -> Result<Vec<u32>, PredictError> {
    let rows = parse_request(body)?;
    Ok(model.predict(&rows)?)
}

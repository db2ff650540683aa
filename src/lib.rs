//! Gradient-boosted iris classifier with an HTTP prediction service.
//!
//! Two binaries share this library:
//!
//! - `iris-train` splits the iris dataset, fits a softmax gradient-boosted
//!   tree ensemble, scores it on the held-out rows and commits a run
//!   (params, accuracy, model artifact) to a file-backed experiment log.
//! - `iris-serve` loads the artifact once at startup and answers
//!   `GET /`, `POST /predict` and `GET /metrics`.
//!
//! ```text
//! iris-train ──► mlruns/<exp>/<run>/artifacts/model/model.json
//!            └─► $MODEL_PATH ──► iris-serve (loaded once, read-only)
//! ```
//!
//! # Modules
//!
//! - [`config`]: Server configuration loading from environment
//! - [`error`]: Unified error types
//! - [`data`]: Dataset container, seeded split, embedded iris data
//! - [`model`]: Classifier trait, boosted trees, artifact IO
//! - [`training`]: Training pipeline and accuracy scoring
//! - [`tracking`]: Experiment log
//! - [`metrics`]: Prediction counters and latency histogram
//! - [`api`]: HTTP API
//! - [`utils`]: Tracing setup and shutdown signal

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod tracking;
pub mod training;
pub mod utils;

#[doc(hidden)]
pub mod test_util;

pub use config::ServerConfig;
pub use error::{AppError, Result};

//! HTTP API module for the welcome, predict and metrics endpoints.

pub mod features;
pub mod handlers;
pub mod routes;

pub use handlers::{AppState, PredictResponse};
pub use routes::create_router;

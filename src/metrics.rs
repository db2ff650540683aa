//! Prometheus metrics for the prediction API.
//!
//! Counters and the latency histogram are registered against an explicit
//! [`PrometheusRecorder`] rather than the global one, so every
//! [`PredictionMetrics`] owns its own registry and tests stay isolated.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Counter, Histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use tracing::debug;

// === Metric Name Constants ===

/// Successful predictions counter metric name.
pub const METRIC_PREDICTION_REQUESTS: &str = "prediction_requests_total";
/// Failed predictions counter metric name.
pub const METRIC_PREDICTION_ERRORS: &str = "prediction_errors_total";
/// Prediction latency metric name.
pub const METRIC_PREDICTION_LATENCY: &str = "prediction_latency_ms";

/// Content type of the text exposition format.
pub const CONTENT_TYPE_LATEST: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Metric handles shared by the request handlers.
///
/// Cloning is cheap; clones update the same underlying atomics.
#[derive(Clone)]
pub struct PredictionMetrics {
    successes: Counter,
    errors: Counter,
    latency: Histogram,
    handle: PrometheusHandle,
}

impl PredictionMetrics {
    /// Create a fresh recorder and register the prediction metrics on it.
    pub fn new() -> Self {
        Self::with_recorder(&PrometheusBuilder::new().build_recorder())
    }

    /// Register the prediction metrics on `recorder`.
    pub fn with_recorder(recorder: &PrometheusRecorder) -> Self {
        let handle = recorder.handle();

        let (successes, errors, latency) = metrics::with_local_recorder(recorder, || {
            describe_counter!(
                METRIC_PREDICTION_REQUESTS,
                Unit::Count,
                "Number of successful prediction requests"
            );
            describe_counter!(
                METRIC_PREDICTION_ERRORS,
                Unit::Count,
                "Number of failed prediction requests"
            );
            describe_histogram!(
                METRIC_PREDICTION_LATENCY,
                Unit::Milliseconds,
                "Prediction request latency in milliseconds"
            );

            (
                counter!(METRIC_PREDICTION_REQUESTS),
                counter!(METRIC_PREDICTION_ERRORS),
                histogram!(METRIC_PREDICTION_LATENCY),
            )
        });

        // Expose both counters at zero before the first request.
        successes.increment(0);
        errors.increment(0);

        debug!("Prediction metrics initialized");

        Self {
            successes,
            errors,
            latency,
            handle,
        }
    }

    /// Increment the successful predictions counter.
    pub fn inc_success(&self) {
        self.successes.increment(1);
    }

    /// Increment the failed predictions counter.
    pub fn inc_error(&self) {
        self.errors.increment(1);
    }

    /// Start timing one prediction. Latency is recorded when the timer drops.
    pub fn timer(&self) -> LatencyTimer {
        LatencyTimer::new(self.latency.clone())
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buckets. Call periodically from a background task.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }
}

impl Default for PredictionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PredictionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionMetrics").finish_non_exhaustive()
    }
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    histogram: Histogram,
}

impl LatencyTimer {
    /// Create a new latency timer recording into `histogram`.
    pub fn new(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        self.histogram.record(self.elapsed_ms());
    }
}

/// Read an unlabelled sample value from rendered exposition text.
pub fn sample_value(exposition: &str, name: &str) -> Option<f64> {
    exposition
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (metric, value) = line.split_once(' ')?;
            (metric == name).then(|| value.trim().parse().ok()).flatten()
        })
}

//! The prediction interface the server depends on.

use crate::error::ModelError;

/// A fitted model that maps feature rows to class labels.
///
/// Implementations are immutable after fitting, so a single instance can be
/// shared across request handlers behind an `Arc`.
pub trait Classifier: Send + Sync {
    /// Number of features every input row must have.
    fn n_features(&self) -> usize;

    /// Labels this model can emit, sorted ascending.
    fn classes(&self) -> &[u32];

    /// Predict the label of one row.
    fn predict_row(&self, x: &[f64]) -> Result<u32, ModelError>;

    /// Predict one label per row, preserving input order.
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<u32>, ModelError> {
        rows.iter().map(|x| self.predict_row(x)).collect()
    }
}

/// Check a row against the trained width and reject non-finite values.
pub fn check_row(x: &[f64], n_features: usize) -> Result<(), ModelError> {
    if x.len() != n_features {
        return Err(ModelError::FeatureMismatch {
            expected: n_features,
            actual: x.len(),
        });
    }

    match x.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ModelError::NonFinite { index }),
        None => Ok(()),
    }
}

//! Held-out scoring.

use crate::data::Dataset;
use crate::error::ModelError;
use crate::model::Classifier;

/// Fraction of positions where `predicted` equals `expected`.
///
/// Returns 0 for empty input.
pub fn accuracy_score(expected: &[u32], predicted: &[u32]) -> f64 {
    let n = expected.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }

    let correct = expected
        .iter()
        .zip(predicted)
        .filter(|(y, p)| y == p)
        .count();

    correct as f64 / n as f64
}

/// Accuracy of `classifier` over `dataset`.
pub fn evaluate<C: Classifier + ?Sized>(classifier: &C, dataset: &Dataset) -> Result<f64, ModelError> {
    let predicted = classifier.predict(dataset.rows())?;
    Ok(accuracy_score(dataset.targets(), &predicted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy_score(&[0, 1, 2, 2], &[0, 1, 1, 2]), 0.75);
        assert_eq!(accuracy_score(&[], &[]), 0.0);
    }
}

//! Multiclass gradient-boosted tree ensemble with softmax output.
//!
//! Each boosting round fits one regression tree per class on the softmax
//! gradient `p_k - y_k` and hessian `p_k (1 - p_k)`, then adds the shrunk
//! tree output to that class's raw score. Prediction is the argmax of the
//! summed raw scores.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::Dataset;
use crate::error::ModelError;

use super::classifier::{check_row, Classifier};
use super::tree::{RegressionTree, TreeParams};

/// Hyperparameters for [`GradientBoostingClassifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostingBuilder {
    /// Boosting rounds; each round adds one tree per class.
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's output.
    pub learning_rate: f64,
    /// Per-tree growth limits.
    pub tree: TreeParams,
    /// Fraction of rows sampled per round. `1.0` disables sampling.
    pub subsample: f64,
    /// Seed for row sampling.
    pub seed: u64,
}

impl Default for GradientBoostingBuilder {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            tree: TreeParams::default(),
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl GradientBoostingBuilder {
    fn validate(&self, dataset: &Dataset) -> Result<Vec<u32>, ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParams("n_estimators must be positive".to_string()));
        }

        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ModelError::InvalidParams(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ModelError::InvalidParams(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }

        if dataset.rows_len() == 0 {
            return Err(ModelError::InvalidParams("training set is empty".to_string()));
        }

        let classes = dataset.classes();
        if classes.len() < 2 {
            return Err(ModelError::InvalidParams(format!(
                "need at least 2 classes, got {}",
                classes.len()
            )));
        }

        Ok(classes)
    }

    /// Fit the ensemble on `dataset`.
    pub fn fit(&self, dataset: &Dataset) -> Result<GradientBoostingClassifier, ModelError> {
        let classes = self.validate(dataset)?;
        let started = Instant::now();

        let rows = dataset.rows();
        let n = rows.len();
        let k = classes.len();

        // Position of every row's label in `classes`.
        let labels: Vec<usize> = dataset
            .targets()
            .iter()
            .map(|y| classes.binary_search(y).unwrap_or_default())
            .collect();

        let init_scores = log_priors(&labels, k);
        let mut scores: Vec<Vec<f64>> = vec![init_scores.clone(); n];

        // Softmax hessian scaling for k classes.
        let factor = k as f64 / (k as f64 - 1.0);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut all: Vec<usize> = (0..n).collect();
        let sample_len = ((n as f64 * self.subsample).ceil() as usize).clamp(1, n);

        let mut rounds = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            let probs: Vec<Vec<f64>> = scores.iter().map(|s| softmax(s)).collect();

            let sample: Vec<usize> = if sample_len < n {
                all.shuffle(&mut rng);
                let mut sample = all[..sample_len].to_vec();
                sample.sort_unstable();
                sample
            } else {
                (0..n).collect()
            };

            let trees: Vec<RegressionTree> = (0..k)
                .into_par_iter()
                .map(|class| {
                    let grad: Vec<f64> = (0..n)
                        .map(|i| probs[i][class] - if labels[i] == class { 1.0 } else { 0.0 })
                        .collect();
                    let hess: Vec<f64> = (0..n)
                        .map(|i| (factor * probs[i][class] * (1.0 - probs[i][class])).max(1e-16))
                        .collect();

                    let mut index = sample.clone();
                    let mut tree = RegressionTree::fit(rows, &grad, &hess, &mut index, &self.tree);
                    tree.scale(self.learning_rate);
                    tree
                })
                .collect();

            for (row, score) in rows.iter().zip(scores.iter_mut()) {
                for (s, tree) in score.iter_mut().zip(&trees) {
                    *s += tree.predict(row);
                }
            }

            if round % 10 == 0 || round + 1 == self.n_estimators {
                debug!(
                    round,
                    logloss = multi_logloss(&scores, &labels),
                    "Boosting round complete"
                );
            }

            rounds.push(trees);
        }

        info!(
            n_estimators = self.n_estimators,
            classes = k,
            rows = n,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Gradient boosting fit complete"
        );

        Ok(GradientBoostingClassifier {
            classes,
            n_features: dataset.features_len(),
            init_scores,
            rounds,
        })
    }
}

/// A fitted gradient-boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    classes: Vec<u32>,
    n_features: usize,
    init_scores: Vec<f64>,
    /// `rounds[r][k]` is the tree for class `k` in round `r`.
    rounds: Vec<Vec<RegressionTree>>,
}

impl GradientBoostingClassifier {
    /// Number of boosting rounds.
    pub fn n_estimators(&self) -> usize {
        self.rounds.len()
    }

    /// Check that the parts of a deserialized model agree with each other.
    ///
    /// A model that passes can score any row of width `n_features` without
    /// indexing out of bounds.
    pub fn validate(&self) -> Result<(), ModelError> {
        let k = self.classes.len();
        if k == 0 {
            return Err(ModelError::Incompatible("no classes".to_string()));
        }

        if self.n_features == 0 {
            return Err(ModelError::Incompatible("n_features is zero".to_string()));
        }

        if self.init_scores.len() != k {
            return Err(ModelError::Incompatible(format!(
                "{} initial scores for {} classes",
                self.init_scores.len(),
                k
            )));
        }

        for (round, trees) in self.rounds.iter().enumerate() {
            if trees.len() != k {
                return Err(ModelError::Incompatible(format!(
                    "round {round} has {} trees for {k} classes",
                    trees.len()
                )));
            }

            let widest = trees.iter().filter_map(RegressionTree::max_feature).max();
            if let Some(feature) = widest.filter(|&f| f >= self.n_features) {
                return Err(ModelError::Incompatible(format!(
                    "round {round} splits on feature {feature}, model has {}",
                    self.n_features
                )));
            }
        }

        Ok(())
    }

    /// Summed raw scores, one per class.
    pub fn raw_scores(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_row(x, self.n_features)?;

        let mut scores = self.init_scores.clone();
        for trees in &self.rounds {
            for (s, tree) in scores.iter_mut().zip(trees) {
                *s += tree.predict(x);
            }
        }

        Ok(scores)
    }

    /// Class probabilities, in the order of [`Classifier::classes`].
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        Ok(softmax(&self.raw_scores(x)?))
    }
}

impl Classifier for GradientBoostingClassifier {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[u32] {
        &self.classes
    }

    fn predict_row(&self, x: &[f64]) -> Result<u32, ModelError> {
        let scores = self.raw_scores(x)?;
        Ok(self.classes[argmax(&scores)])
    }
}

fn log_priors(labels: &[usize], k: usize) -> Vec<f64> {
    let mut counts = vec![0usize; k];
    for &label in labels {
        counts[label] += 1;
    }

    let n = labels.len() as f64;
    counts
        .into_iter()
        .map(|c| ((c.max(1)) as f64 / n).ln())
        .collect()
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

fn multi_logloss(scores: &[Vec<f64>], labels: &[usize]) -> f64 {
    let total: f64 = scores
        .iter()
        .zip(labels)
        .map(|(s, &y)| -softmax(s)[y].max(1e-15).ln())
        .sum();
    total / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{load_iris, Builder};
    use pretty_assertions::assert_eq;

    fn blobs() -> Dataset {
        let mut builder = Builder::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64 * 0.1;
            builder.add(&[0.0 + jitter, 0.0 + jitter], 0).unwrap();
            builder.add(&[5.0 + jitter, 5.0 - jitter], 1).unwrap();
            builder.add(&[10.0 - jitter, 0.0 + jitter], 2).unwrap();
        }
        builder.build().unwrap()
    }

    fn small_builder() -> GradientBoostingBuilder {
        GradientBoostingBuilder {
            n_estimators: 20,
            tree: TreeParams {
                min_samples_leaf: 5,
                ..TreeParams::default()
            },
            ..GradientBoostingBuilder::default()
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
    }

    #[test]
    fn fits_separable_blobs() {
        let model = small_builder().fit(&blobs()).unwrap();

        assert_eq!(model.classes(), &[0, 1, 2]);
        assert_eq!(model.n_estimators(), 20);
        assert_eq!(model.predict_row(&[0.1, 0.1]).unwrap(), 0);
        assert_eq!(model.predict_row(&[5.0, 5.0]).unwrap(), 1);
        assert_eq!(model.predict_row(&[9.9, 0.2]).unwrap(), 2);
    }

    #[test]
    fn batch_prediction_preserves_order() {
        let model = small_builder().fit(&blobs()).unwrap();
        let rows = vec![vec![9.9, 0.2], vec![0.1, 0.1], vec![5.0, 5.0]];
        assert_eq!(model.predict(&rows).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let model = small_builder().fit(&blobs()).unwrap();
        assert!(matches!(
            model.predict_row(&[1.0]),
            Err(ModelError::FeatureMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn fit_is_deterministic() {
        let a = small_builder().fit(&blobs()).unwrap();
        let b = small_builder().fit(&blobs()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn subsampled_fit_is_deterministic_per_seed() {
        let builder = GradientBoostingBuilder {
            subsample: 0.5,
            ..small_builder()
        };
        let a = builder.fit(&blobs()).unwrap();
        let b = builder.fit(&blobs()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_invalid_params() {
        let data = blobs();
        let zero = GradientBoostingBuilder {
            n_estimators: 0,
            ..GradientBoostingBuilder::default()
        };
        assert!(matches!(zero.fit(&data), Err(ModelError::InvalidParams(_))));

        let negative = GradientBoostingBuilder {
            learning_rate: -0.1,
            ..GradientBoostingBuilder::default()
        };
        assert!(matches!(negative.fit(&data), Err(ModelError::InvalidParams(_))));
    }

    #[test]
    fn rejects_single_class() {
        let mut builder = Builder::new();
        builder.add(&[1.0], 3).unwrap();
        builder.add(&[2.0], 3).unwrap();
        let data = builder.build().unwrap();

        assert!(matches!(
            GradientBoostingBuilder::default().fit(&data),
            Err(ModelError::InvalidParams(_))
        ));
    }

    #[test]
    fn iris_setosa_is_class_zero() {
        let iris = load_iris().unwrap();
        let model = GradientBoostingBuilder::default().fit(&iris).unwrap();

        assert_eq!(model.predict_row(&[5.1, 3.5, 1.4, 0.2]).unwrap(), 0);
        let proba = model.predict_proba(&[5.1, 3.5, 1.4, 0.2]).unwrap();
        assert_eq!(proba.len(), 3);
        assert!(proba[0] > 0.9);
    }

    #[test]
    fn fitted_model_validates() {
        let model = small_builder().fit(&blobs()).unwrap();
        assert!(model.validate().is_ok());
    }
}

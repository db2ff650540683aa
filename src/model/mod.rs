//! Classifier trait, gradient-boosted tree ensemble, and artifact IO.

pub mod artifact;
pub mod classifier;
pub mod gbdt;
pub mod tree;

pub use classifier::Classifier;
pub use gbdt::{GradientBoostingBuilder, GradientBoostingClassifier};
pub use tree::{RegressionTree, TreeParams};

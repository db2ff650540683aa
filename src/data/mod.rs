//! Datasets for training and evaluation.

pub mod dataset;
pub mod iris;

pub use dataset::{Builder, Dataset};
pub use iris::load_iris;

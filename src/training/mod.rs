//! Training pipeline.

pub mod evaluation;
pub mod trainer;

pub use evaluation::{accuracy_score, evaluate};
pub use trainer::{train, TrainOptions, TrainReport};

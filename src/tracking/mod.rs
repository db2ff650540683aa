//! Experiment log for training runs.

pub mod run;
pub mod store;

pub use run::{ActiveRun, MetricPoint, RunInfo, RunStatus};
pub use store::{ExperimentInfo, RunStore};

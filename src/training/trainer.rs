//! One training run: split, fit, score, record.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument};

use crate::data::load_iris;
use crate::error::Result;
use crate::model::{artifact, GradientBoostingBuilder, GradientBoostingClassifier};
use crate::tracking::{RunInfo, RunStore};

use super::evaluation::evaluate;

/// Settings for a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Experiment the run is filed under.
    pub experiment: String,
    /// Boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage.
    pub learning_rate: f64,
    /// Seed for the split and the model.
    pub seed: u64,
    /// Held-out fraction.
    pub test_size: f64,
    /// Extra copy of the artifact for the server, if set.
    pub model_out: Option<PathBuf>,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            experiment: "lightgbm_classification_model".to_string(),
            n_estimators: 100,
            learning_rate: 0.1,
            seed: 42,
            test_size: 0.2,
            model_out: None,
        }
    }
}

/// Outcome of a committed run.
#[derive(Debug)]
pub struct TrainReport {
    /// Committed run metadata.
    pub run: RunInfo,
    /// Held-out accuracy.
    pub accuracy: f64,
    /// Fitted model.
    pub model: GradientBoostingClassifier,
}

/// Run the full pipeline and commit one run to `store`.
///
/// Any error before the commit leaves nothing recorded. The `model_out` copy
/// is written only after the run is committed.
#[instrument(skip(store), fields(experiment = %options.experiment))]
pub fn train(options: &TrainOptions, store: &RunStore) -> Result<TrainReport> {
    let started = Instant::now();

    let iris = load_iris()?;
    let (train, test) = iris.train_test_split(options.test_size, options.seed)?;
    info!(train = train.rows_len(), test = test.rows_len(), "Dataset split");

    let experiment_id = store.experiment(&options.experiment)?;
    let mut run = store.start_run(&experiment_id)?;

    let builder = GradientBoostingBuilder {
        n_estimators: options.n_estimators,
        learning_rate: options.learning_rate,
        seed: options.seed,
        ..GradientBoostingBuilder::default()
    };
    let model = builder.fit(&train)?;

    let accuracy = evaluate(&model, &test)?;

    run.log_param("n_estimators", options.n_estimators)?;
    run.log_param("learning_rate", options.learning_rate)?;
    run.log_metric("accuracy", accuracy, 0)?;

    let input_example = vec![train.rows()[0].clone()];
    run.log_model("model", &model, &input_example)?;

    let run = run.finish()?;

    info!(
        run_id = %run.run_id,
        accuracy,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Training run committed"
    );

    if let Some(path) = &options.model_out {
        artifact::save(path, &model)?;
    }

    Ok(TrainReport {
        run,
        accuracy,
        model,
    })
}

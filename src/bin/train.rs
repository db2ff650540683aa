//! Training entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use iris_serve::tracking::RunStore;
use iris_serve::training::{train, TrainOptions};
use iris_serve::utils::init_tracing;

/// Train the iris classifier and record the run.
#[derive(Parser, Debug)]
#[command(name = "iris-train")]
#[command(about = "Fit a gradient-boosted classifier on iris and log the run")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Experiment log directory.
    #[arg(long, env = "MLFLOW_TRACKING_DIR", default_value = "./mlruns")]
    tracking_dir: PathBuf,

    /// Experiment name.
    #[arg(long, default_value = "lightgbm_classification_model")]
    experiment: String,

    /// Also write the model artifact here, for the server to load.
    #[arg(long, env = "MODEL_PATH")]
    model_out: Option<PathBuf>,

    /// Boosting rounds.
    #[arg(long, default_value_t = 100)]
    n_estimators: usize,

    /// Shrinkage per tree.
    #[arg(long, default_value_t = 0.1)]
    learning_rate: f64,

    /// Seed for the split and the model.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Held-out fraction.
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,
}

impl From<Args> for TrainOptions {
    fn from(args: Args) -> Self {
        Self {
            experiment: args.experiment,
            n_estimators: args.n_estimators,
            learning_rate: args.learning_rate,
            seed: args.seed,
            test_size: args.test_size,
            model_out: args.model_out,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose, "info");

    info!(dir = %args.tracking_dir.display(), "Opening experiment log");
    let store = RunStore::open(&args.tracking_dir)?;

    let options = TrainOptions::from(args);
    let report = train(&options, &store).map_err(|e| {
        error!("Training failed: {}", e);
        e
    })?;

    println!("Model logged successfully with Accuracy: {}", report.accuracy);
    Ok(())
}

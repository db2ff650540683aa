//! Prediction service entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use iris_serve::api::{create_router, AppState};
use iris_serve::config::ServerConfig;
use iris_serve::metrics::PredictionMetrics;
use iris_serve::model::{artifact, Classifier};
use iris_serve::utils::{init_tracing, shutdown_signal};

/// Histogram upkeep interval.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Serve the trained classifier over HTTP.
///
/// Reads `MODEL_PATH`, `PORT` and `RUST_LOG` from the environment.
#[derive(Parser, Debug)]
#[command(name = "iris-serve")]
#[command(about = "HTTP prediction API for the trained iris classifier")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = ServerConfig::load()?;

    // Initialize logging
    init_tracing(args.verbose, &config.rust_log);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    // Load the model; without it the server never becomes ready.
    info!(path = %config.model_path.display(), "Loading model...");
    let model = artifact::load(&config.model_path).map_err(|e| {
        error!(path = %config.model_path.display(), "Failed to load model: {}", e);
        e
    })?;
    info!(
        n_features = model.n_features(),
        classes = ?model.classes(),
        n_estimators = model.n_estimators(),
        "Model loaded"
    );

    // Create app state
    let metrics = PredictionMetrics::new();
    let app_state = AppState::new(Arc::new(model), metrics.clone());

    // Keep histogram buckets drained
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            metrics.run_upkeep();
        }
    });

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

//! End-to-end tests: train on iris, write the artifact, load it the way the
//! server does, and drive the router.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use iris_serve::api::{create_router, AppState};
use iris_serve::metrics::{sample_value, PredictionMetrics, METRIC_PREDICTION_ERRORS, METRIC_PREDICTION_REQUESTS};
use iris_serve::error::ModelError;
use iris_serve::model::{artifact, Classifier};
use iris_serve::test_util::ScratchDir;
use iris_serve::tracking::RunStore;
use iris_serve::training::{train, TrainOptions};

/// Train with default options and return the exported artifact path.
fn trained_artifact(scratch: &ScratchDir) -> PathBuf {
    let model_path = scratch.path().join("model/model.pkl");
    let store = RunStore::open(scratch.path().join("mlruns")).unwrap();
    let options = TrainOptions {
        model_out: Some(model_path.clone()),
        ..TrainOptions::default()
    };

    train(&options, &store).unwrap();
    model_path
}

fn serve(model_path: &Path) -> AppState {
    let model = artifact::load(model_path).unwrap();
    AppState::new(Arc::new(model), PredictionMetrics::new())
}

async fn post(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn setosa_vector_predicts_class_zero() {
    let scratch = ScratchDir::new("it").unwrap();
    let state = serve(&trained_artifact(&scratch));

    let (status, body) = post(create_router(state), r#"{"features": [5.1, 3.5, 1.4, 0.2]}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "predictions": [0] }));
}

#[tokio::test]
async fn batch_of_two_returns_two_known_labels() {
    let scratch = ScratchDir::new("it").unwrap();
    let state = serve(&trained_artifact(&scratch));
    let classes = state.model.classes().to_vec();

    let (status, body) = post(
        create_router(state),
        r#"{"features": [[5.1,3.5,1.4,0.2],[6.7,3.1,4.7,1.5]]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let predictions: Vec<u32> = serde_json::from_value(body["predictions"].clone()).unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0], 0);
    assert!(predictions.iter().all(|p| classes.contains(p)));
}

#[tokio::test]
async fn empty_object_is_500_with_error() {
    let scratch = ScratchDir::new("it").unwrap();
    let state = serve(&trained_artifact(&scratch));

    let (status, body) = post(create_router(state.clone()), "{}").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["error"].as_str().unwrap_or_default().is_empty());

    let text = state.metrics.render();
    assert_eq!(sample_value(&text, METRIC_PREDICTION_ERRORS), Some(1.0));
    assert_eq!(sample_value(&text, METRIC_PREDICTION_REQUESTS), Some(0.0));
}

#[tokio::test]
async fn welcome_is_always_available() {
    let scratch = ScratchDir::new("it").unwrap();
    let state = serve(&trained_artifact(&scratch));

    for _ in 0..3 {
        let response = create_router(state.clone())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(!body.is_empty());

        post(create_router(state.clone()), "not json").await;
    }
}

#[test]
fn training_is_reproducible() {
    let scratch = ScratchDir::new("it").unwrap();
    let store = RunStore::open(scratch.path()).unwrap();
    let options = TrainOptions::default();

    let first = train(&options, &store).unwrap();
    let second = train(&options, &store).unwrap();

    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(first.model, second.model);
    assert_ne!(first.run.run_id, second.run.run_id);

    let exp = store.experiment(&options.experiment).unwrap();
    assert_eq!(store.runs(&exp).unwrap().len(), 2);
}

#[test]
fn corrupt_artifact_fails_to_load() {
    let scratch = ScratchDir::new("it").unwrap();
    let path = scratch.path().join("model.pkl");
    fs::write(&path, "{\"classes\": [0, 1]}").unwrap();

    assert!(artifact::load(&path).is_err());
    assert!(artifact::load(&scratch.path().join("absent.pkl")).is_err());
}

#[test]
fn artifact_without_classes_is_rejected_at_load() {
    let scratch = ScratchDir::new("it").unwrap();
    let path = scratch.path().join("model.pkl");
    fs::write(
        &path,
        r#"{"classes": [], "n_features": 4, "init_scores": [], "rounds": []}"#,
    )
    .unwrap();

    assert!(matches!(artifact::load(&path), Err(ModelError::Incompatible(_))));
}

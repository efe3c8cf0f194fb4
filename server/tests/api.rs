//! HTTP tests driving the router with `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use italiclas_data::ArtifactStore;
use italiclas_learning::{
    FittedPipeline, OptimizerConfig, PipelineParams, SearchSpace, SearchStrategy, TrainerConfig,
};
use italiclas_server::{
    AppState, ArtifactPipeline, RetrainStatus, Retrainer, ServeError, Settings, UNAVAILABLE_DETAIL, app,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../crates/italiclas-data/tests/fixtures")
}

fn settings(dir: &TempDir) -> Settings {
    Settings {
        data_dir: dir.path().join("data"),
        ml_dir: dir.path().join("ml"),
        ..Settings::default()
    }
}

fn save_pipeline(path: &Path) {
    let texts = ["ciao amico mio", "buongiorno a tutti", "hello my friend", "good morning everyone"];
    let labels = [true, true, false, false];
    let pipeline = FittedPipeline::fit(PipelineParams::default(), &texts, &labels).unwrap();
    ArtifactStore::default().save(&pipeline, path).unwrap();
}

/// Writes a pipeline after a short delay and counts its runs.
#[derive(Default)]
struct CountingRetrainer {
    runs: AtomicUsize,
}

impl Retrainer for CountingRetrainer {
    fn retrain(&self, pipeline_path: &Path) -> Result<(), ServeError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(500));
        save_pipeline(pipeline_path);
        Ok(())
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Ping
// ============================================================================

#[tokio::test]
async fn test_ping_returns_version() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(settings(&dir), Arc::new(CountingRetrainer::default()));

    let (status, body) = send(app(state), get_request("/api/v1/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": env!("CARGO_PKG_VERSION")}));
}

#[tokio::test]
async fn test_custom_base_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        api_prefix: "service".to_string(),
        api_version: String::new(),
        ..settings(&dir)
    };
    let app = app(AppState::new(settings, Arc::new(CountingRetrainer::default())));

    let (status, _) = send(app.clone(), get_request("/service/ping")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(app, get_request("/api/v1/ping")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Predict
// ============================================================================

#[tokio::test]
async fn test_predict_with_model() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    save_pipeline(&settings.pipeline_path());
    let app = app(AppState::new(settings, Arc::new(CountingRetrainer::default())));

    let (status, body) = send(app.clone(), post_json("/api/v1/predict", r#"{"text": "ciao a tutti"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"is_italian": true}));

    // Unknown fields are ignored
    let (status, body) = send(
        app.clone(),
        post_json("/api/v1/predict", r#"{"text": "hello everyone", "lang": "en"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"is_italian": false}));

    let (status, body) = send(app, post_json("/api/v1/predict", r#"{"text": "ciao mondo", "a": "b"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"is_italian": true}));
}

#[tokio::test]
async fn test_predict_rejects_bad_payloads() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(AppState::new(settings(&dir), Arc::new(CountingRetrainer::default())));

    for payload in [r#"{"text": ""}"#, r#"{"text": "   "}"#, r#"{"message": "ciao"}"#, "not json"] {
        let (status, body) = send(app.clone(), post_json("/api/v1/predict", payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "payload: {payload}");
        assert_eq!(body["code"], "INVALID_PAYLOAD");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_model_answers_503_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let retrainer = Arc::new(CountingRetrainer::default());
    let state = AppState::new(settings(&dir), retrainer.clone());
    let app = app(state.clone());

    let requests: Vec<_> = (0..20)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { send(app, post_json("/api/v1/predict", r#"{"text": "ciao"}"#)).await })
        })
        .collect();
    for request in requests {
        let (status, body) = request.await.unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], UNAVAILABLE_DETAIL);
        assert_eq!(body["code"], "DATA_UNAVAILABLE");
    }

    let path = state.coordinator.pipeline_path().to_path_buf();
    let status = state.coordinator.trigger_retrain(&path).wait().await;
    assert_eq!(status, RetrainStatus::Succeeded);
    assert_eq!(retrainer.runs.load(Ordering::SeqCst), 1);

    let (status, body) = send(app, post_json("/api/v1/predict", r#"{"text": "ciao amico"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"is_italian": true}));
}

#[tokio::test]
async fn test_corrupt_model_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);
    std::fs::create_dir_all(&settings.ml_dir).unwrap();
    std::fs::write(settings.pipeline_path(), b"definitely not a model").unwrap();
    let retrainer = Arc::new(CountingRetrainer::default());
    let app = app(AppState::new(settings, retrainer.clone()));

    let (status, body) = send(app, post_json("/api/v1/predict", r#"{"text": "ciao"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DESERIALIZATION_FAILED");
    assert_eq!(retrainer.runs.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Artifact Pipeline
// ============================================================================

fn zipped_fixture() -> Vec<u8> {
    let csv = std::fs::read(fixtures_path().join("languages.csv")).unwrap();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("Language Detection.csv", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(&csv).unwrap();
    writer.finish().unwrap().into_inner()
}

fn quick_trainer() -> TrainerConfig {
    let optimizer = OptimizerConfig::builder()
        .strategy(SearchStrategy::Exhaustive)
        .cv_folds(2)
        .search_space(SearchSpace::single(PipelineParams::default()))
        .build()
        .unwrap();
    TrainerConfig::builder().optimizer(optimizer).build().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_artifact_pipeline_builds_everything() {
    let archive = zipped_fixture();
    let source = Router::new().route(
        "/data.zip",
        get(move || {
            let archive = archive.clone();
            async move { archive }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, source).await.unwrap() });

    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        raw_data_source: format!("http://{addr}/data.zip"),
        ..settings(&dir)
    };
    let retrainer = Arc::new(ArtifactPipeline::from_settings(&settings).with_trainer_config(quick_trainer()));
    let state = AppState::new(settings.clone(), retrainer);

    let path = settings.pipeline_path();
    let status = state.coordinator.trigger_retrain(&path).wait().await;
    assert_eq!(status, RetrainStatus::Succeeded);
    for artifact in [settings.raw_path(), settings.clean_path(), settings.params_path(), path] {
        assert!(artifact.is_file(), "missing {}", artifact.display());
    }

    let app = app(state);
    let (_, body) = send(app.clone(), post_json("/api/v1/predict", r#"{"text": "Il gatto dorme sul divano"}"#)).await;
    assert_eq!(body, json!({"is_italian": true}));
    let (_, body) = send(app, post_json("/api/v1/predict", r#"{"text": "The cat is sleeping on the sofa"}"#)).await;
    assert_eq!(body, json!({"is_italian": false}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_retrain_reuses_cached_artifacts() {
    let archive = zipped_fixture();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let source = Router::new().route(
        "/data.zip",
        get(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let archive = archive.clone();
            async move { archive }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, source).await.unwrap() });

    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        raw_data_source: format!("http://{addr}/data.zip"),
        ..settings(&dir)
    };
    let retrainer = Arc::new(ArtifactPipeline::from_settings(&settings).with_trainer_config(quick_trainer()));
    let state = AppState::new(settings.clone(), retrainer);
    let path = settings.pipeline_path();

    let status = state.coordinator.trigger_retrain(&path).wait().await;
    assert_eq!(status, RetrainStatus::Succeeded);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    let model_bytes = std::fs::read(&path).unwrap();

    // A miss that raced the first run starts a second one after it finished
    let ticket = state.coordinator.trigger_retrain(&path);
    assert!(ticket.is_started());
    assert_eq!(ticket.wait().await, RetrainStatus::Succeeded);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&path).unwrap(), model_bytes);

    let (status, body) = send(app(state), post_json("/api/v1/predict", r#"{"text": "Il gatto dorme sul divano"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"is_italian": true}));
}

#[tokio::test]
async fn test_artifact_pipeline_reports_unavailable_source() {
    let source = Router::new().route("/data.zip", get(|| async { StatusCode::NOT_FOUND }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, source).await.unwrap() });

    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        raw_data_source: format!("http://{addr}/data.zip"),
        ..settings(&dir)
    };
    let state = AppState::new(settings.clone(), Arc::new(ArtifactPipeline::from_settings(&settings)));

    let status = state
        .coordinator
        .trigger_retrain(&settings.pipeline_path())
        .wait()
        .await;
    assert!(matches!(status, RetrainStatus::Failed(ref msg) if msg.contains("404")), "{status:?}");
    assert!(!state.coordinator.is_retraining(&settings.pipeline_path()));
}

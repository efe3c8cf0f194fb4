//! Integration tests for the fetch and clean steps.
//!
//! The fetch tests serve archives from a local axum server bound to an
//! ephemeral port; the blocking fetcher runs on the test thread.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use italiclas_data::{
    ArtifactStore, CleanDataset, Cleaner, Compression, EtlError, FetchOutcome, Fetcher,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// ============================================================================
// Helper Functions
// ============================================================================

const ENTRY: &str = "Language Detection.csv";

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn raw_csv() -> Vec<u8> {
    fs::read(fixtures_path().join("languages.csv")).unwrap()
}

fn zip_with(entry: &str, content: &[u8]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file(entry, SimpleFileOptions::default()).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Start a server for `router`; it stops when the runtime is dropped.
fn serve(router: Router) -> (Runtime, String) {
    let runtime = Runtime::new().unwrap();
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    runtime.spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (runtime, format!("http://{addr}"))
}

fn archive_server(hits: Arc<AtomicUsize>) -> (Runtime, String) {
    let archive = zip_with(ENTRY, &raw_csv());
    let wrong = zip_with("other.csv", b"text,language\n");
    let router = Router::new()
        .route(
            "/data.zip",
            get(move || {
                hits.fetch_add(1, Ordering::SeqCst);
                let archive = archive.clone();
                async move { archive }
            }),
        )
        .route(
            "/wrong.zip",
            get(move || {
                let wrong = wrong.clone();
                async move { wrong }
            }),
        )
        .route("/not-a-zip", get(|| async { "plain text" }))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/broken",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
    serve(router)
}

// ============================================================================
// Fetch Tests
// ============================================================================

#[test]
fn test_fetch_downloads_then_hits_cache() {
    let hits = Arc::new(AtomicUsize::new(0));
    let (_runtime, base) = archive_server(hits.clone());
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("data/raw_data.csv");
    let fetcher = Fetcher::new(ENTRY).unwrap();
    let url = format!("{base}/data.zip");

    let outcome = fetcher.fetch(&url, &dest, false).unwrap();
    assert_eq!(outcome, FetchOutcome::Downloaded(dest.clone()));
    assert_eq!(fs::read(&dest).unwrap(), raw_csv());

    let outcome = fetcher.fetch(&url, &dest, false).unwrap();
    assert_eq!(outcome, FetchOutcome::Cached(dest.clone()));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let outcome = fetcher.fetch(&url, &dest, true).unwrap();
    assert_eq!(outcome, FetchOutcome::Downloaded(dest.clone()));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn test_fetch_force_replaces_truncated_file() {
    let (_runtime, base) = archive_server(Arc::new(AtomicUsize::new(0)));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("raw_data.csv");
    fs::write(&dest, "text,lang").unwrap();
    let fetcher = Fetcher::new(ENTRY).unwrap();

    let outcome = fetcher.fetch(&format!("{base}/data.zip"), &dest, true).unwrap();
    assert_eq!(outcome, FetchOutcome::Downloaded(dest.clone()));
    assert_eq!(fs::read(&dest).unwrap(), raw_csv());

    // Only the final file remains in the directory
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![dest.file_name().unwrap().to_owned()]);
}

#[test]
fn test_fetch_error_status_is_unavailable() {
    let (_runtime, base) = archive_server(Arc::new(AtomicUsize::new(0)));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("raw_data.csv");
    let fetcher = Fetcher::new(ENTRY).unwrap();

    for (route, status) in [("missing", 404), ("broken", 500)] {
        let outcome = fetcher
            .fetch(&format!("{base}/{route}"), &dest, false)
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Unavailable { status });
        assert!(!dest.exists());
    }
}

#[test]
fn test_fetch_missing_entry() {
    let (_runtime, base) = archive_server(Arc::new(AtomicUsize::new(0)));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("raw_data.csv");

    let err = Fetcher::new(ENTRY)
        .unwrap()
        .fetch(&format!("{base}/wrong.zip"), &dest, false)
        .unwrap_err();
    assert!(matches!(err, EtlError::ArchiveEntryMissing { .. }));
    assert!(!dest.exists());
}

#[test]
fn test_fetch_body_not_an_archive() {
    let (_runtime, base) = archive_server(Arc::new(AtomicUsize::new(0)));
    let dir = tempfile::tempdir().unwrap();

    let err = Fetcher::new(ENTRY)
        .unwrap()
        .fetch(&format!("{base}/not-a-zip"), &dir.path().join("raw.csv"), false)
        .unwrap_err();
    assert_eq!(err.error_code(), "ARCHIVE_INVALID");
}

#[test]
fn test_fetch_timeout() {
    let (_runtime, base) = archive_server(Arc::new(AtomicUsize::new(0)));
    let dir = tempfile::tempdir().unwrap();

    let err = Fetcher::with_timeout(ENTRY, 1)
        .unwrap()
        .fetch(&format!("{base}/slow"), &dir.path().join("raw.csv"), false)
        .unwrap_err();
    assert!(
        matches!(err, EtlError::UpstreamTimeout { timeout_secs: 1, .. }),
        "unexpected error: {err}"
    );
}

// ============================================================================
// Clean Tests
// ============================================================================

#[test]
fn test_clean_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let clean_path = dir.path().join("clean_data.bin");

    let dataset = Cleaner::new(ArtifactStore::default())
        .clean(&fixtures_path().join("languages.csv"), &clean_path, false)
        .unwrap();

    let stats = dataset.stats();
    assert_eq!(stats.rows, 16);
    assert_eq!(stats.positives, 6);
    assert_eq!(dataset.texts()[0], "Ciao, come stai oggi?");
    assert!(clean_path.is_file());
}

#[test]
fn test_clean_cache_hit_does_not_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let clean_path = dir.path().join("clean_data.bin");
    let raw_path = dir.path().join("raw_data.csv");
    fs::write(&raw_path, raw_csv()).unwrap();
    let cleaner = Cleaner::new(ArtifactStore::default());

    let first = cleaner.clean(&raw_path, &clean_path, false).unwrap();
    let bytes = fs::read(&clean_path).unwrap();
    let modified = fs::metadata(&clean_path).unwrap().modified().unwrap();

    // Raw data is not needed any more on a hit
    fs::remove_file(&raw_path).unwrap();
    let second = cleaner.clean(&raw_path, &clean_path, false).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(&clean_path).unwrap(), bytes);
    assert_eq!(fs::metadata(&clean_path).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_clean_force_recomputes() {
    let dir = tempfile::tempdir().unwrap();
    let clean_path = dir.path().join("clean_data.bin");
    let raw_path = dir.path().join("raw_data.csv");
    fs::write(&raw_path, "Text,Language\nciao,Italian\n").unwrap();
    let cleaner = Cleaner::new(ArtifactStore::default());
    assert_eq!(cleaner.clean(&raw_path, &clean_path, false).unwrap().len(), 1);

    fs::write(&raw_path, raw_csv()).unwrap();
    assert_eq!(cleaner.clean(&raw_path, &clean_path, false).unwrap().len(), 1);
    assert_eq!(cleaner.clean(&raw_path, &clean_path, true).unwrap().len(), 16);

    let stored: CleanDataset = ArtifactStore::default().load(&clean_path).unwrap();
    assert_eq!(stored.len(), 16);
}

#[test]
fn test_clean_invalid_raw_names_columns() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("raw_data.csv");
    fs::write(&raw_path, "Sentence,Language\nciao,Italian\n").unwrap();

    let err = Cleaner::new(ArtifactStore::default())
        .clean(&raw_path, &dir.path().join("clean.bin"), false)
        .unwrap_err();
    match err {
        EtlError::SchemaInvalid { dataset, violation } => {
            assert_eq!(dataset, "raw");
            assert_eq!(violation.missing, vec!["text".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_clean_corrupt_cache_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let clean_path = dir.path().join("clean_data.bin");
    fs::write(&clean_path, b"garbage").unwrap();

    let err = Cleaner::new(ArtifactStore::default())
        .clean(&fixtures_path().join("languages.csv"), &clean_path, false)
        .unwrap_err();
    assert_eq!(err.error_code(), "DESERIALIZATION_FAILED");
    assert!(!err.is_artifact_not_found());
}

#[test]
fn test_clean_reads_uncompressed_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let clean_path = dir.path().join("clean_data.bin");
    let raw_path = fixtures_path().join("languages.csv");

    let written = Cleaner::new(ArtifactStore::new(Compression::None))
        .clean(&raw_path, &clean_path, false)
        .unwrap();
    let read = Cleaner::new(ArtifactStore::new(Compression::Gzip))
        .clean(&raw_path, &clean_path, false)
        .unwrap();
    assert_eq!(written, read);
}

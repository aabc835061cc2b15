use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::*;
use base64::Engine as _;
use axum::{
    extract::{Query, State},
    http::StatusCode as HttpStatus,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Recorded {
    status_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    translate_bodies: Arc<Mutex<Vec<Value>>>,
}

async fn view_pdf(Json(body): Json<Value>) -> (HttpStatus, Json<Value>) {
    match body["path"].as_str() {
        Some("/docs/a.pdf") => (
            HttpStatus::OK,
            Json(json!({
                "image": STANDARD.encode(format!("page-{}", body["page"])),
                "total_pages": 3
            })),
        ),
        _ => (
            HttpStatus::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "pdf could not be opened" })),
        ),
    }
}

async fn read_file(Query(query): Query<HashMap<String, String>>) -> (HttpStatus, Json<Value>) {
    match query.get("path").map(String::as_str) {
        Some("/docs/notes.md") => (HttpStatus::OK, Json(json!({ "content": "# Notes" }))),
        _ => (
            HttpStatus::NOT_FOUND,
            Json(json!({ "message": "file not found" })),
        ),
    }
}

async fn translate(State(state): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    let path = body["path"].as_str().unwrap_or_default().to_string();
    state.translate_bodies.lock().expect("lock").push(body);
    if path == "/docs/locked.pdf" {
        Json(json!({ "error": "document is already being translated" }))
    } else {
        Json(json!({ "status": "started" }))
    }
}

async fn translation_status(
    State(state): State<Recorded>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.status_queries.lock().expect("lock").push(query);
    Json(json!({
        "status": "running",
        "progress_percent": 42.6,
        "chunks_completed": 1,
        "total_chunks": 2,
        "chunks_info": [
            { "status": "completed", "header": "Intro", "size": 1200 },
            { "status": "translating" }
        ],
        "partial_results": "## Intro"
    }))
}

async fn translation_result(
    Query(query): Query<HashMap<String, String>>,
) -> (HttpStatus, Json<Value>) {
    match query.get("path").map(String::as_str) {
        Some("/docs/a.pdf") => (
            HttpStatus::OK,
            Json(json!({ "content": "번역", "translated_path": "/out/a.ko.md" })),
        ),
        _ => (HttpStatus::NOT_FOUND, Json(json!({ "error": "not found" }))),
    }
}

async fn download(Query(query): Query<HashMap<String, String>>) -> Vec<u8> {
    format!("bytes of {}", query.get("path").cloned().unwrap_or_default()).into_bytes()
}

async fn select_folder(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "files": [
            { "path": format!("{}/a.pdf", body["path"].as_str().unwrap_or_default()),
              "name": "a.pdf", "language": "ja", "confidence": 87.4, "type": "pdf" },
            { "path": "/docs/notes.md", "type": "markdown" }
        ],
        "message": "2 files"
    }))
}

async fn spawn_backend() -> anyhow::Result<(HttpDocumentSource, Recorded)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Recorded::default();
    let app = Router::new()
        .route("/api/select-folder", post(select_folder))
        .route("/api/view-pdf", post(view_pdf))
        .route("/api/read-file", get(read_file))
        .route("/api/translate", post(translate))
        .route("/api/translation-status", get(translation_status))
        .route("/api/translation-result", get(translation_result))
        .route("/api/download", get(download))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let source = HttpDocumentSource::new(&format!("http://{addr}/"))?;
    Ok((source, state))
}

#[tokio::test]
async fn select_folder_lists_descriptors() {
    let (source, _) = spawn_backend().await.expect("backend");
    let listing = source.select_folder("/docs").await.expect("listing");

    assert_eq!(listing.message.as_deref(), Some("2 files"));
    let documents: Vec<_> = listing
        .files
        .into_iter()
        .map(|entry| entry.into_descriptor())
        .collect();
    assert_eq!(documents[0].path(), "/docs/a.pdf");
    assert_eq!(documents[0].detection_confidence, 87);
    assert_eq!(documents[0].badge_label(), "🇯🇵 a.pdf");
    assert_eq!(documents[1].text_source(), Some("/docs/notes.md"));
}

#[tokio::test]
async fn view_pdf_decodes_page_image() {
    let (source, _) = spawn_backend().await.expect("backend");
    let page = source.view_pdf("/docs/a.pdf", 2, Some(150)).await.expect("page");

    assert_eq!(page.png, b"page-2".to_vec());
    assert_eq!(page.total_pages, 3);
}

#[tokio::test]
async fn error_body_becomes_status_error() {
    let (source, _) = spawn_backend().await.expect("backend");
    let err = source
        .view_pdf("/docs/broken.pdf", 1, None)
        .await
        .expect_err("server error");

    assert_eq!(
        err,
        ClientError::Status {
            status: 500,
            message: "pdf could not be opened".into(),
        }
    );
    assert!(err.is_transport());
}

#[tokio::test]
async fn read_file_returns_content_or_backend_message() {
    let (source, _) = spawn_backend().await.expect("backend");
    assert_eq!(
        source.read_file("/docs/notes.md").await.expect("content"),
        "# Notes"
    );

    let err = source.read_file("/docs/gone.md").await.expect_err("missing");
    assert_eq!(err.user_message(), "file not found");
}

#[tokio::test]
async fn start_translation_requires_started_ack() {
    let (source, recorded) = spawn_backend().await.expect("backend");
    source
        .start_translation("/docs/a.pdf")
        .await
        .expect("started");

    let err = source
        .start_translation("/docs/locked.pdf")
        .await
        .expect_err("rejected");
    assert_eq!(
        err,
        ClientError::Backend("document is already being translated".into())
    );
    assert!(!err.is_transport());
    let bodies = recorded.translate_bodies.lock().expect("lock").clone();
    assert_eq!(
        bodies,
        vec![
            json!({ "path": "/docs/a.pdf" }),
            json!({ "path": "/docs/locked.pdf" })
        ]
    );
}

#[tokio::test]
async fn translation_status_sends_partial_flag() {
    let (source, recorded) = spawn_backend().await.expect("backend");
    let payload = source
        .translation_status("/docs/a b.pdf", true)
        .await
        .expect("status");

    assert_eq!(payload.progress_percent, Some(42.6));
    assert_eq!(payload.chunks_info.as_ref().map(Vec::len), Some(2));
    assert_eq!(payload.partial_results.as_deref(), Some("## Intro"));
    let queries = recorded.status_queries.lock().expect("lock").clone();
    assert_eq!(queries[0].get("path").map(String::as_str), Some("/docs/a b.pdf"));
    assert_eq!(
        queries[0].get("include_partial").map(String::as_str),
        Some("true")
    );
}

#[tokio::test]
async fn missing_translation_result_is_none() {
    let (source, _) = spawn_backend().await.expect("backend");

    let found = source
        .translation_result("/docs/a.pdf")
        .await
        .expect("result")
        .expect("present");
    assert_eq!(found.content, "번역");
    assert_eq!(found.translated_path.as_deref(), Some("/out/a.ko.md"));

    assert_eq!(
        source.translation_result("/docs/new.pdf").await,
        Ok(None)
    );
}

#[tokio::test]
async fn download_returns_raw_bytes() {
    let (source, _) = spawn_backend().await.expect("backend");
    let bytes = source.download("/out/a.ko.md").await.expect("bytes");
    assert_eq!(bytes, b"bytes of /out/a.ko.md".to_vec());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let source = HttpDocumentSource::new(&format!("http://{addr}")).expect("source");
    let err = source
        .translation_status("/docs/a.pdf", true)
        .await
        .expect_err("connection refused");
    assert!(matches!(err, ClientError::Transport(_)));
}

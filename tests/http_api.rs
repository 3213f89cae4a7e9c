//! End-to-end tests against the HTTP API, driven in process.
//!
//! These use the deterministic hash embedder and a temp-dir SQLite index,
//! so no network access or API keys are required. Answers come from the
//! local fallback provider.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use askdoc::answer::AnswerGenerator;
use askdoc::config::Config;
use askdoc::embedding::HashEmbedder;
use askdoc::pipeline::Pipeline;
use askdoc::server::{router, AppState};
use askdoc::store::SqliteStore;

fn offline_config() -> Config {
    Config {
        ai_provider: "openai".to_string(),
        openai_api_key: None,
        openai_embedding_model: "text-embedding-3-small".to_string(),
        openai_chat_model: "gpt-4o-mini".to_string(),
        gemini_api_key: None,
        gemini_model: "gemini-2.5-flash".to_string(),
        vector_db: "sqlite".to_string(),
        pinecone_api_key: None,
        pinecone_index_host: None,
        sqlite_path: PathBuf::from(":memory:"),
        embedding_provider: "hash".to_string(),
        chunk_size: 1200,
        chunk_overlap: 200,
        max_file_size_mb: 1,
        request_timeout_secs: 30,
        max_retries: 3,
        bind: "127.0.0.1:0".to_string(),
    }
}

async fn test_app(tmp: &TempDir) -> Router {
    let config = offline_config();
    let store = SqliteStore::connect(&tmp.path().join("index.sqlite"))
        .await
        .unwrap();
    let pipeline = Pipeline::new(
        config.clone(),
        Box::new(HashEmbedder::new()),
        Box::new(store),
        AnswerGenerator::from_config(&config),
    );
    router(AppState {
        pipeline: Arc::new(pipeline),
    })
}

const BOUNDARY: &str = "askdoc-test-boundary";

fn multipart_upload(filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn qa_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/qa/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn root_serves_welcome_message() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await["message"]
        .as_str()
        .unwrap()
        .contains("askdoc"));
}

#[tokio::test]
async fn upload_txt_returns_receipt() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(multipart_upload(
            "notes.txt",
            b"First paragraph of notes.\n\nSecond paragraph of notes.",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["chunk_count"], 2);
    assert_eq!(body["filename"], "notes.txt");
    assert!(!body["doc_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn upload_then_ask_round_trip() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .clone()
        .oneshot(multipart_upload(
            "facts.txt",
            b"The capital of France is Paris.\n\nThe Seine flows through it.",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc_id = json_body(response).await["doc_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(qa_request(json!({
            "question": "What is the capital of France?",
            "doc_id": doc_id,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    // No API keys configured, so the local fallback answers.
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .contains("basic local response"));
    assert_eq!(body["used_chunks"], 2);
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["filename"], "facts.txt");
    assert!(sources[0]["score"].as_f64().unwrap() >= sources[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn ask_unknown_doc_id_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(qa_request(json!({
            "question": "anything?",
            "doc_id": "never-uploaded",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(&json_body(response).await), "no_context");
}

#[tokio::test]
async fn ask_empty_question_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(qa_request(json!({
            "question": "   ",
            "doc_id": "whatever",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "empty_question");
}

#[tokio::test]
async fn upload_unsupported_extension_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(multipart_upload("program.exe", b"binary junk"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_code(&json_body(response).await),
        "unsupported_file_type"
    );
}

#[tokio::test]
async fn upload_oversized_file_is_payload_too_large() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    // Config caps uploads at 1 MiB.
    let big = vec![b'x'; 1024 * 1024 + 512 * 1024];
    let response = app.oneshot(multipart_upload("big.txt", &big)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(&json_body(response).await), "file_too_large");
}

#[tokio::test]
async fn upload_blank_file_is_unprocessable() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .oneshot(multipart_upload("blank.txt", b"  \n \n  "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        error_code(&json_body(response).await),
        "no_extractable_text"
    );
}

#[tokio::test]
async fn upload_without_file_field_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{BOUNDARY}--\r\n"
        )
        .as_bytes(),
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "missing_file");
}

#[tokio::test]
async fn documents_are_isolated_by_doc_id() {
    let tmp = TempDir::new().unwrap();
    let app = test_app(&tmp).await;

    let response = app
        .clone()
        .oneshot(multipart_upload("a.txt", b"Document A talks about apples."))
        .await
        .unwrap();
    let doc_a = json_body(response).await["doc_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(multipart_upload("b.txt", b"Document B talks about bridges."))
        .await
        .unwrap();
    let doc_b = json_body(response).await["doc_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(doc_a, doc_b);

    let response = app
        .oneshot(qa_request(json!({
            "question": "apples?",
            "doc_id": doc_a,
            "top_k": 10,
        })))
        .await
        .unwrap();
    let body = json_body(response).await;
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["filename"], "a.txt");
}

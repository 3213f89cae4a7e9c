//! HTTP surface: axum router, handlers, and the error envelope.
//!
//! Handlers stay thin. The request body is decoded here, everything else is
//! delegated to [`Pipeline`], and [`PipelineError`] maps 1:1 onto status
//! codes. All error responses share the `{"error": {"code", "message"}}`
//! envelope.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::models::{QaOutcome, QaRequest, UploadReceipt};
use crate::pipeline::{Pipeline, PipelineError};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// API error carrying the status, a stable machine-readable code, and a
/// human-readable message.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        let message = e.to_string();
        match e {
            PipelineError::UnsupportedExtension(_) => {
                Self::bad_request("unsupported_file_type", message)
            }
            PipelineError::FileTooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "file_too_large", message)
            }
            PipelineError::NoExtractableText(_) => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_extractable_text",
                message,
            ),
            PipelineError::NoChunks => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "no_chunks", message)
            }
            PipelineError::EmptyQuestion => Self::bad_request("empty_question", message),
            PipelineError::NoContext(_) => {
                Self::new(StatusCode::NOT_FOUND, "no_context", message)
            }
            PipelineError::Upstream(e) => {
                tracing::error!(error = %e, "request failed upstream");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error",
                )
            }
        }
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "askdoc is running. POST a document to /upload/, then ask it questions at /qa/."
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request("invalid_multipart", e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request("missing_filename", "file field has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request("invalid_multipart", e.to_string()))?;

        let receipt = state.pipeline.ingest(&filename, &bytes).await?;
        return Ok(Json(receipt));
    }
    Err(AppError::bad_request(
        "missing_file",
        "multipart field 'file' is required",
    ))
}

async fn qa(
    State(state): State<AppState>,
    Json(req): Json<QaRequest>,
) -> Result<Json<QaOutcome>, AppError> {
    let outcome = state
        .pipeline
        .answer(&req.question, &req.doc_id, req.top_k)
        .await?;
    Ok(Json(outcome))
}

/// Builds the application router. Split out from [`run_server`] so tests can
/// drive the routes in process.
pub fn router(state: AppState) -> Router {
    // Body limit sits above the configured ceiling so oversized uploads reach
    // the pipeline and get the structured 413 instead of a bare axum reject.
    let body_limit = state.pipeline.config().max_file_bytes() as usize + 1024 * 1024;
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/upload/", post(upload))
        .route("/qa/", post(qa))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_server(pipeline: Pipeline) -> anyhow::Result<()> {
    let bind = pipeline.config().bind.clone();
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

//! Core data types flowing through the ingest and query pipeline.

use serde::{Deserialize, Serialize};

/// Metadata stored alongside each chunk vector and echoed back on retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub doc_id: String,
    #[serde(default)]
    pub filename: Option<String>,
    /// Zero-based chunk index within the owning document.
    #[serde(default)]
    pub chunk: Option<i64>,
    #[serde(default)]
    pub text: String,
}

/// One `(id, vector, metadata)` triple ready for upsert.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub meta: ChunkMeta,
}

/// A nearest-neighbor match returned by a vector store query. Scores are
/// higher-is-better similarities; their range is backend-defined and not
/// comparable across backends.
#[derive(Debug, Clone)]
pub struct RetrievalMatch {
    pub id: String,
    pub score: f32,
    pub meta: ChunkMeta,
}

/// Response body for `POST /upload/`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub doc_id: String,
    pub chunk_count: usize,
    pub filename: String,
}

/// Request body for `POST /qa/`.
#[derive(Debug, Clone, Deserialize)]
pub struct QaRequest {
    pub question: String,
    pub doc_id: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

/// One retrieved source in a QA response, in ranked order.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub id: String,
    pub score: f32,
    pub chunk: Option<i64>,
    pub filename: Option<String>,
}

/// Response body for `POST /qa/`.
#[derive(Debug, Clone, Serialize)]
pub struct QaOutcome {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub used_chunks: usize,
}

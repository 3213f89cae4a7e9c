//! Pipeline orchestration: the ingest and query flows.
//!
//! The [`Pipeline`] is the composition root. It owns the embedder, the
//! vector store, and the answer generator (constructed once at startup,
//! passed in explicitly), and wires them into two stateless flows:
//!
//! ```text
//! ingest: validate → extract → chunk → embed → upsert
//! query:  validate → embed question → retrieve → prompt → generate
//! ```
//!
//! Data flows strictly forward; after upsert the pipeline never caches or
//! re-derives vectors. Failures map onto a typed [`PipelineError`] that the
//! HTTP layer translates 1:1 into status codes.

use anyhow::Result;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::answer::{AnswerGenerator, Prompt, SYSTEM_PROMPT};
use crate::chunk::split_blocks;
use crate::config::Config;
use crate::embedding::{embed_one, Embedder};
use crate::extract::{extract_blocks, ExtractError};
use crate::models::{ChunkMeta, ChunkRecord, QaOutcome, SourceRef, UploadReceipt};
use crate::store::VectorStore;

/// Request-level pipeline failure. Client errors carry enough detail for a
/// human-readable 4xx; upstream provider failures stay generic.
#[derive(Debug)]
pub enum PipelineError {
    UnsupportedExtension(String),
    FileTooLarge { size: u64, limit: u64 },
    /// Extraction failed or produced no text blocks.
    NoExtractableText(String),
    NoChunks,
    EmptyQuestion,
    /// Nothing indexed under this `doc_id`.
    NoContext(String),
    /// Embedding, storage, or generation failure.
    Upstream(anyhow::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::UnsupportedExtension(ext) => {
                write!(f, "unsupported file type: '{}'", ext)
            }
            PipelineError::FileTooLarge { size, limit } => {
                write!(f, "file of {} bytes exceeds the {} byte limit", size, limit)
            }
            PipelineError::NoExtractableText(reason) => {
                write!(f, "no extractable text: {}", reason)
            }
            PipelineError::NoChunks => write!(f, "document produced no chunks"),
            PipelineError::EmptyQuestion => write!(f, "question is empty"),
            PipelineError::NoContext(doc_id) => {
                write!(f, "no context found for document id '{}'", doc_id)
            }
            PipelineError::Upstream(e) => write!(f, "upstream provider error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<anyhow::Error> for PipelineError {
    fn from(e: anyhow::Error) -> Self {
        PipelineError::Upstream(e)
    }
}

/// Lowercased extension of `filename`, without the dot; empty when absent.
pub fn file_ext(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Chunk identifier: `{sha256(filename|doc_id)[..16]}-{index}`. Including
/// the freshly generated `doc_id` in the hash keeps ids distinct across
/// re-uploads of the same file.
fn chunk_id(filename: &str, doc_id: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(filename.as_bytes());
    hasher.update(b"|");
    hasher.update(doc_id.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", &digest[..16], index)
}

/// The composition root wiring extraction, chunking, embedding, storage,
/// and generation into the ingest and query flows.
pub struct Pipeline {
    config: Config,
    embedder: Box<dyn Embedder>,
    store: Box<dyn VectorStore>,
    generator: AnswerGenerator,
}

impl Pipeline {
    /// Explicit dependency injection; used directly by tests.
    pub fn new(
        config: Config,
        embedder: Box<dyn Embedder>,
        store: Box<dyn VectorStore>,
        generator: AnswerGenerator,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            generator,
        }
    }

    /// Construct all collaborators from configuration. Fails fast when the
    /// embedder or store cannot be built.
    pub async fn from_config(config: Config) -> Result<Self> {
        let embedder = crate::embedding::create_embedder(&config)?;
        let store = crate::store::create_store(&config).await?;
        let generator = AnswerGenerator::from_config(&config);
        tracing::info!(
            embedder = embedder.model_name(),
            vector_db = %config.vector_db,
            providers = ?generator.provider_names(),
            "pipeline ready"
        );
        Ok(Self::new(config, embedder, store, generator))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest flow: validate → extract → chunk → embed → upsert.
    pub async fn ingest(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, PipelineError> {
        let ext = file_ext(filename);
        if !self.config.is_allowed_ext(&ext) {
            return Err(PipelineError::UnsupportedExtension(ext));
        }

        let size = bytes.len() as u64;
        let limit = self.config.max_file_bytes();
        if size > limit {
            return Err(PipelineError::FileTooLarge { size, limit });
        }

        let blocks = extract_blocks(bytes, &ext).map_err(|e| match e {
            ExtractError::UnsupportedExtension(ext) => PipelineError::UnsupportedExtension(ext),
            other => PipelineError::NoExtractableText(other.to_string()),
        })?;
        if blocks.is_empty() {
            return Err(PipelineError::NoExtractableText(
                "document contains no text".to_string(),
            ));
        }

        let chunks = split_blocks(&blocks, self.config.chunk_size, self.config.chunk_overlap);
        if chunks.is_empty() {
            return Err(PipelineError::NoChunks);
        }

        let vectors = self.embedder.embed(&chunks).await?;

        let doc_id = Uuid::new_v4().to_string();
        let records: Vec<ChunkRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (text, vector))| ChunkRecord {
                id: chunk_id(filename, &doc_id, index),
                vector,
                meta: ChunkMeta {
                    doc_id: doc_id.clone(),
                    filename: Some(filename.to_string()),
                    chunk: Some(index as i64),
                    text: text.clone(),
                },
            })
            .collect();

        let chunk_count = records.len();
        self.store.upsert(&doc_id, records).await?;

        tracing::info!(%doc_id, filename, chunk_count, "document ingested");

        Ok(UploadReceipt {
            doc_id,
            chunk_count,
            filename: filename.to_string(),
        })
    }

    /// Query flow: validate → embed question → retrieve → prompt → generate.
    pub async fn answer(
        &self,
        question: &str,
        doc_id: &str,
        top_k: usize,
    ) -> Result<QaOutcome, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let top_k = top_k.max(1);

        let question_vec = embed_one(self.embedder.as_ref(), question).await?;

        let matches = self.store.query(doc_id, &question_vec, top_k).await?;
        if matches.is_empty() {
            return Err(PipelineError::NoContext(doc_id.to_string()));
        }

        let chunk_texts: Vec<String> = matches.iter().map(|m| m.meta.text.clone()).collect();
        let prompt = Prompt::new(question, &chunk_texts);
        let answer = self.generator.generate(SYSTEM_PROMPT, &prompt).await?;

        let sources: Vec<SourceRef> = matches
            .iter()
            .map(|m| SourceRef {
                id: m.id.clone(),
                score: m.score,
                chunk: m.meta.chunk,
                filename: m.meta.filename.clone(),
            })
            .collect();

        tracing::info!(%doc_id, used_chunks = matches.len(), "question answered");

        Ok(QaOutcome {
            answer,
            sources,
            used_chunks: matches.len(),
        })
    }
}

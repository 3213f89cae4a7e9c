//! Embedding client abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete backends:
//! - **[`OpenAiEmbedder`]** — calls the OpenAI embeddings API with retry and backoff.
//! - **`LocalEmbedder`** — runs a sentence-embedding model locally via fastembed
//!   (behind the `local-embeddings` feature); no network calls after model download.
//! - **[`HashEmbedder`]** — deterministic offline vectors derived from a text
//!   digest; for tests and development only, carries no semantic signal.
//!
//! Backend selection happens once at startup via [`create_embedder`]: the
//! remote provider is preferred when an API key is configured, the local model
//! is the fallback, and construction fails fast when neither is available so
//! ingestion never starts against a half-configured embedder.
//!
//! Vector dimensionality and normalization are backend-defined. Switching
//! backends after documents have been ingested silently corrupts similarity
//! comparisons; re-ingest instead.
//!
//! Also provides the vector utilities used by the SQLite store:
//! [`cosine_similarity`], [`vec_to_blob`], and [`blob_to_vec`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::Config;

/// Maps a batch of texts to fixed-dimension vectors, same length and order
/// as the input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let results = embedder.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Create the embedding backend selected by configuration.
///
/// `"auto"` prefers OpenAI when `OPENAI_API_KEY` is set, then the local
/// model, and fails otherwise. Explicit values force one backend and fail
/// when it is unavailable.
pub fn create_embedder(config: &Config) -> Result<Box<dyn Embedder>> {
    match config.embedding_provider.as_str() {
        "openai" => Ok(Box::new(OpenAiEmbedder::new(config)?)),
        "local" => create_local(config),
        "hash" => Ok(Box::new(HashEmbedder::new())),
        "auto" => {
            if config.openai_api_key.is_some() {
                Ok(Box::new(OpenAiEmbedder::new(config)?))
            } else {
                create_local(config)
            }
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(feature = "local-embeddings")]
fn create_local(config: &Config) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(LocalEmbedder::new(config)?))
}

#[cfg(not(feature = "local-embeddings"))]
fn create_local(_config: &Config) -> Result<Box<dyn Embedder>> {
    bail!(
        "No embedding backend available. Set OPENAI_API_KEY or build with \
         --features local-embeddings."
    )
}

// ============ OpenAI ============

/// Embedding client for `POST https://api.openai.com/v1/embeddings`.
///
/// Batched, with exponential backoff for rate limits (429), server errors
/// (5xx), and network failures; other client errors fail immediately.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let model = config.openai_embedding_model.clone();
        let dims = match model.as_str() {
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };

        Ok(Self {
            client,
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_openai_embeddings(&json);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        tracing::warn!(%status, attempt, "embedding request failed, retrying");
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

fn parse_openai_embeddings(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

// ============ Local (fastembed) ============

/// Local embedding backend (all-MiniLM-L6-v2, 384 dimensions, normalized).
///
/// The model is downloaded from Hugging Face on first use and cached; after
/// that, embedding runs entirely offline.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(_config: &Config) -> Result<Self> {
        Ok(Self {
            model_name: "all-minilm-l6-v2".to_string(),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        384
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                    .with_show_download_progress(false),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;

            model
                .embed(texts, None)
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

// ============ Hash (offline, deterministic) ============

/// Deterministic embedder that derives unit vectors from a SHA-256 digest of
/// the text. Equal texts map to equal vectors; there is no semantic
/// similarity between different texts. Always available, no network, no model.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { dims: 64 }
    }

    pub fn with_dims(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut values = Vec::with_capacity(self.dims);
        let mut round: u32 = 0;
        while values.len() < self.dims {
            let mut hasher = Sha256::new();
            hasher.update(round.to_le_bytes());
            hasher.update(text.as_bytes());
            for byte in hasher.finalize() {
                if values.len() == self.dims {
                    break;
                }
                values.push(f32::from(byte) / 127.5 - 1.0);
            }
            round += 1;
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut values {
                *v /= norm;
            }
        }
        values
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

// ============ Vector utilities ============

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

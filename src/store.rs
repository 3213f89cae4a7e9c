//! Vector store backends.
//!
//! A [`VectorStore`] persists `(id, vector, metadata)` triples partitioned by
//! document id and answers nearest-neighbor queries scoped to one document.
//! Two backends:
//! - **[`SqliteStore`]** — local persistent index in SQLite (WAL mode, vectors
//!   as little-endian f32 BLOBs, cosine scoring in process).
//! - **[`PineconeStore`]** — managed cloud index over the Pinecone REST
//!   data plane, one namespace per document id.
//!
//! Querying a partition that has never been written returns an empty list,
//! never an error. Score semantics are backend-internal: Pinecone returns a
//! similarity directly; the SQLite backend measures cosine distance and
//! converts it to a similarity before returning, so raw distances never
//! leave this module.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkMeta, ChunkRecord, RetrievalMatch};

/// Durable storage and retrieval of chunk vectors, partitioned by `doc_id`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records in the document's partition, creating the
    /// partition on first write.
    async fn upsert(&self, doc_id: &str, records: Vec<ChunkRecord>) -> Result<()>;

    /// Top-k nearest neighbors within the document's partition, best first.
    /// Returns fewer than `top_k` when fewer records exist, and an empty list
    /// when the partition does not exist.
    async fn query(&self, doc_id: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<RetrievalMatch>>;
}

/// Construct the backend selected by `VECTOR_DB`.
pub async fn create_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.vector_db.as_str() {
        "sqlite" => Ok(Box::new(SqliteStore::connect(&config.sqlite_path).await?)),
        "pinecone" => Ok(Box::new(PineconeStore::new(config)?)),
        other => bail!("Unsupported VECTOR_DB: '{}'. Use 'sqlite' or 'pinecone'.", other),
    }
}

// ============ SQLite ============

/// Local persistent index backed by SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                doc_id TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                filename TEXT,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (doc_id, chunk_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_doc_id ON chunk_vectors(doc_id)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn upsert(&self, doc_id: &str, records: Vec<ChunkRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in &records {
            let blob = vec_to_blob(&record.vector);
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (doc_id, chunk_id, chunk_index, filename, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(doc_id, chunk_id) DO UPDATE SET
                    chunk_index = excluded.chunk_index,
                    filename = excluded.filename,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(doc_id)
            .bind(&record.id)
            .bind(record.meta.chunk.unwrap_or(0))
            .bind(&record.meta.filename)
            .bind(&record.meta.text)
            .bind(&blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        doc_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>> {
        let rows = sqlx::query(
            "SELECT chunk_id, chunk_index, filename, text, embedding FROM chunk_vectors WHERE doc_id = ?",
        )
        .bind(doc_id)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<RetrievalMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                // The local index measures cosine distance; convert to a
                // similarity here so raw distances never leave the store.
                let distance = 1.0 - cosine_similarity(vector, &stored);
                RetrievalMatch {
                    id: row.get("chunk_id"),
                    score: 1.0 - distance,
                    meta: ChunkMeta {
                        doc_id: doc_id.to_string(),
                        filename: row.get("filename"),
                        chunk: Some(row.get("chunk_index")),
                        text: row.get("text"),
                    },
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        Ok(matches)
    }
}

// ============ Pinecone ============

/// Managed cloud index over the Pinecone REST data plane.
///
/// Each document's chunks live in a namespace named by the `doc_id`;
/// namespaces are created implicitly on first upsert. Pinecone returns
/// similarity scores natively, so no conversion is needed.
pub struct PineconeStore {
    client: reqwest::Client,
    host: String,
    api_key: String,
}

impl PineconeStore {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .pinecone_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("PINECONE_API_KEY not set"))?;
        let host = config
            .pinecone_index_host
            .clone()
            .ok_or_else(|| anyhow::anyhow!("PINECONE_INDEX_HOST not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, doc_id: &str, records: Vec<ChunkRecord>) -> Result<()> {
        let vectors: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "id": record.id,
                    "values": record.vector,
                    "metadata": record.meta,
                })
            })
            .collect();

        let body = serde_json::json!({
            "vectors": vectors,
            "namespace": doc_id,
        });

        let response = self
            .client
            .post(format!("{}/vectors/upsert", self.host))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Pinecone upsert error {}: {}", status, body_text);
        }
        Ok(())
    }

    async fn query(
        &self,
        doc_id: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>> {
        let body = serde_json::json!({
            "vector": vector,
            "topK": top_k,
            "namespace": doc_id,
            "includeMetadata": true,
        });

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // An unknown namespace is "no results", not an error.
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Pinecone query error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let empty = Vec::new();
        let raw_matches = json
            .get("matches")
            .and_then(|m| m.as_array())
            .unwrap_or(&empty);

        let mut matches = Vec::with_capacity(raw_matches.len());
        for m in raw_matches {
            let id = m
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let score = m.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
            let meta = m
                .get("metadata")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or(ChunkMeta {
                    doc_id: doc_id.to_string(),
                    filename: None,
                    chunk: None,
                    text: String::new(),
                });
            matches.push(RetrievalMatch { id, score, meta });
        }

        Ok(matches)
    }
}

use anyhow::{Context, Result};
use std::path::PathBuf;

/// File extensions accepted by the upload endpoint.
pub const ALLOWED_EXTS: [&str; 3] = ["pdf", "docx", "txt"];

/// Runtime configuration, read once from the environment at startup.
///
/// Empty-string values are treated the same as unset (mirrors typical
/// `.env` files where keys are present but blank).
#[derive(Debug, Clone)]
pub struct Config {
    /// Preferred answer provider: `"openai"` or `"gemini"`.
    pub ai_provider: String,
    pub openai_api_key: Option<String>,
    pub openai_embedding_model: String,
    pub openai_chat_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Vector store backend: `"sqlite"` (local) or `"pinecone"`.
    pub vector_db: String,
    pub pinecone_api_key: Option<String>,
    /// Data-plane host of the Pinecone index, e.g. `https://my-index-abc123.svc.us-east-1.pinecone.io`.
    pub pinecone_index_host: Option<String>,
    /// Path of the local SQLite index (sqlite backend only).
    pub sqlite_path: PathBuf,
    /// Embedding backend: `"auto"` (openai if keyed, else local), `"openai"`,
    /// `"local"`, or `"hash"` (deterministic, offline; tests and dev only).
    pub embedding_provider: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_file_size_mb: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub bind: String,
}

fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_opt(name) {
        Some(v) => v
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: {}", name, v)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            ai_provider: env_or("AI_PROVIDER", "openai").to_lowercase(),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_embedding_model: env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            openai_chat_model: env_or("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
            vector_db: env_or("VECTOR_DB", "sqlite").to_lowercase(),
            pinecone_api_key: env_opt("PINECONE_API_KEY"),
            pinecone_index_host: env_opt("PINECONE_INDEX_HOST"),
            sqlite_path: PathBuf::from(env_or("SQLITE_PATH", ".askdoc/index.sqlite")),
            embedding_provider: env_or("EMBEDDING_PROVIDER", "auto").to_lowercase(),
            chunk_size: env_parse("CHUNK_SIZE", 1200)?,
            chunk_overlap: env_parse("CHUNK_OVERLAP", 200)?,
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB", 40)?,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30)?,
            max_retries: env_parse("MAX_RETRIES", 3)?,
            bind: env_or("BIND", "127.0.0.1:8000"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("CHUNK_SIZE must be > 0");
        }
        if self.max_file_size_mb == 0 {
            anyhow::bail!("MAX_FILE_SIZE_MB must be > 0");
        }
        match self.ai_provider.as_str() {
            "openai" | "gemini" => {}
            other => anyhow::bail!(
                "Unknown AI_PROVIDER: '{}'. Must be openai or gemini.",
                other
            ),
        }
        match self.vector_db.as_str() {
            "sqlite" => {}
            "pinecone" => {
                if self.pinecone_api_key.is_none() {
                    anyhow::bail!("PINECONE_API_KEY must be set when VECTOR_DB is 'pinecone'");
                }
                if self.pinecone_index_host.is_none() {
                    anyhow::bail!("PINECONE_INDEX_HOST must be set when VECTOR_DB is 'pinecone'");
                }
            }
            other => anyhow::bail!(
                "Unsupported VECTOR_DB: '{}'. Use 'sqlite' or 'pinecone'.",
                other
            ),
        }
        match self.embedding_provider.as_str() {
            "auto" | "openai" | "local" | "hash" => {}
            other => anyhow::bail!(
                "Unknown EMBEDDING_PROVIDER: '{}'. Must be auto, openai, local, or hash.",
                other
            ),
        }
        Ok(())
    }

    /// Upload size ceiling in bytes.
    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// True when `ext` (lowercase, no dot) is accepted by the upload endpoint.
    pub fn is_allowed_ext(&self, ext: &str) -> bool {
        ALLOWED_EXTS.contains(&ext)
    }
}

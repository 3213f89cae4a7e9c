//! # askdoc CLI
//!
//! The `askdoc` binary serves the HTTP API and offers one-shot commands for
//! indexing and querying from the terminal.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdoc serve` | Start the HTTP API (upload + QA endpoints) |
//! | `askdoc ingest <path>` | Index one document, print its `doc_id` |
//! | `askdoc ask "<question>" --doc-id <id>` | Answer a question against an indexed document |
//!
//! All settings come from the environment (`AI_PROVIDER`, `OPENAI_API_KEY`,
//! `VECTOR_DB`, `SQLITE_PATH`, `CHUNK_SIZE`, ...); see the README for the
//! full list.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use askdoc::config::Config;
use askdoc::pipeline::Pipeline;
use askdoc::server;

/// Document question answering over your own files.
#[derive(Parser)]
#[command(
    name = "askdoc",
    about = "Ask questions about your own documents (PDF, DOCX, TXT)",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    ///
    /// Binds to `BIND` (default `127.0.0.1:8000`) and serves `POST /upload/`,
    /// `POST /qa/`, and `GET /health`.
    Serve,

    /// Index a single document and print the resulting `doc_id`.
    Ingest {
        /// Path to a `.pdf`, `.docx`, or `.txt` file.
        path: PathBuf,
    },

    /// Answer a question against a previously indexed document.
    Ask {
        /// The question to answer.
        question: String,

        /// `doc_id` printed by `askdoc ingest` (or returned by `/upload/`).
        #[arg(long)]
        doc_id: String,

        /// Number of chunks to retrieve as context.
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("askdoc=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve => {
            let pipeline = Pipeline::from_config(config).await?;
            server::run_server(pipeline).await?;
        }
        Commands::Ingest { path } => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("path has no usable filename")?
                .to_string();
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;

            let pipeline = Pipeline::from_config(config).await?;
            let receipt = pipeline
                .ingest(&filename, &bytes)
                .await
                .map_err(anyhow::Error::new)?;
            println!(
                "Indexed '{}' as doc_id {} ({} chunks)",
                receipt.filename, receipt.doc_id, receipt.chunk_count
            );
        }
        Commands::Ask {
            question,
            doc_id,
            top_k,
        } => {
            let pipeline = Pipeline::from_config(config).await?;
            let outcome = pipeline
                .answer(&question, &doc_id, top_k)
                .await
                .map_err(anyhow::Error::new)?;
            println!("{}\n", outcome.answer);
            println!("Sources ({} chunks):", outcome.used_chunks);
            for source in outcome.sources {
                println!(
                    "  {:.4}  {}  (chunk {})",
                    source.score,
                    source.id,
                    source.chunk.map_or_else(|| "?".to_string(), |c| c.to_string())
                );
            }
        }
    }

    Ok(())
}

//! # askdoc
//!
//! Ask questions about your own documents. askdoc ingests PDF, DOCX, and
//! plain-text files, chunks and embeds them, stores the vectors in a local
//! SQLite index (or Pinecone), and answers questions grounded strictly in
//! the retrieved chunks via OpenAI or Gemini.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌───────────┐
//! │  Upload  │──▶│     Pipeline      │──▶│  SQLite / │
//! │ pdf/docx │   │ extract→chunk→emb │   │  Pinecone │
//! │   /txt   │   └───────────────────┘   └─────┬─────┘
//! └──────────┘                                 │
//!                ┌──────────────────┐          │
//! ┌──────────┐   │     Pipeline     │◀─────────┘
//! │ Question │──▶│ retrieve→prompt  │──▶ OpenAI / Gemini / fallback
//! └──────────┘   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! askdoc serve                                # start the HTTP API
//! askdoc ingest ./notes.pdf                   # index a document
//! askdoc ask "What is covered?" --doc-id <id> # ask against it
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration |
//! | [`models`] | Core data types and API payloads |
//! | [`extract`] | PDF/DOCX/TXT text extraction |
//! | [`chunk`] | Text normalization and chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector storage and retrieval |
//! | [`answer`] | Prompt assembly and the answer provider chain |
//! | [`pipeline`] | Ingest and query orchestration |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;

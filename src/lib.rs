//! Collaborative synthesis over a hosted LLM, with an engram knowledge base.
//!
//! mem42 answers a free-text query by fanning it out to a fixed set of "persona"
//! prompts, folding their plans into a retrieval query, pulling the most similar
//! engrams from a vector store, and synthesizing a final answer. On request the
//! answer is distilled into a long-term memory point. A second flow ingests
//! documents: each is compressed into an engram, embedded, and stored with tags.
//!
//! # Architecture
//!
//! - **Generation/embedding**: Gemini REST API behind the [`llm::TextGenerator`] and
//!   [`llm::Embedder`] traits
//! - **Knowledge base**: SQLite with in-process cosine ranking, or Qdrant, behind
//!   [`store::VectorStore`]
//! - **Orchestration**: five-stage pipeline streaming [`synthesis::events::SynthesisEvent`]s
//! - **Transport**: HTTP with Server-Sent Events, MCP over stdio, or the CLI
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, and migrations
//! - [`ingest`]: Document to engram ingestion
//! - [`llm`]: Hosted generation and embedding client
//! - [`memory`]: Memory point parsing and persistence
//! - [`ranker`]: Top-K cosine-similarity ranking
//! - [`store`]: Engram vector store backends
//! - [`synthesis`]: The collaborative synthesis orchestrator

pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod ranker;
pub mod store;
pub mod synthesis;

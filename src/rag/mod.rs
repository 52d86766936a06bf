//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `loader` / `chunker`: uploaded bytes to overlapping text windows
//! - `embedder`: text to vectors (OpenAI-compatible HTTP or local hashing)
//! - `RagStore` / `SqliteRagStore`: persisted vectors with cosine search
//! - `KnowledgeBase`: ingest, retrieve and clear on top of the above

pub mod chunker;
pub mod embedder;
pub mod knowledge_base;
pub mod loader;
pub mod sqlite;
pub mod store;

pub use chunker::{Chunk, Chunker};
pub use embedder::{Embedder, HashEmbedder, OpenAiEmbedder};
pub use knowledge_base::{HtmlAsset, IngestReport, KbStatus, KnowledgeBase};
pub use loader::{parse_document, Document};
pub use sqlite::SqliteRagStore;
pub use store::{reconcile_embedding_model, ChunkSearchResult, RagStore, SourceSummary, StoredChunk};

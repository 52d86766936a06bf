//! Abstract interface for the knowledge-base vector index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_LATEST_HTML: &str = "latest_html";
pub const META_LATEST_HTML_SOURCE: &str = "latest_html_source";

/// A persisted chunk. The embedding vector is stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub text: String,
    /// Filename of the document the chunk came from.
    pub source: String,
    pub start_offset: usize,
    pub chunk_index: usize,
    /// RFC 3339 timestamp of the upload.
    pub ingested_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert chunks with their embeddings in one transaction.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        self.insert_batch_with_meta(items, &[]).await
    }

    /// Insert chunks and upsert `meta` entries in the same transaction.
    async fn insert_batch_with_meta(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
        meta: &[(&str, &str)],
    ) -> Result<(), ApiError>;

    /// Nearest neighbours of `query_embedding` by cosine similarity, best
    /// first. Equal scores keep insertion order.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;

    /// Distinct source filenames with their chunk counts, ordered by name.
    async fn sources(&self) -> Result<Vec<SourceSummary>, ApiError>;

    /// Remove every chunk. Returns the number removed. Meta entries are kept;
    /// see [`clear_knowledge_base`].
    async fn clear(&self) -> Result<usize, ApiError>;

    async fn get_meta(&self, key: &str) -> Result<Option<String>, ApiError>;

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), ApiError>;

    async fn delete_meta(&self, key: &str) -> Result<(), ApiError>;
}

/// Removes every chunk together with the remembered HTML page.
pub async fn clear_knowledge_base(store: &dyn RagStore) -> Result<usize, ApiError> {
    let removed = store.clear().await?;
    store.delete_meta(META_LATEST_HTML).await?;
    store.delete_meta(META_LATEST_HTML_SOURCE).await?;
    Ok(removed)
}

/// Makes the index consistent with the active embedder.
///
/// Vectors produced by another model live in a different space, so when the
/// recorded model differs (or chunks exist without a recorded model) the index
/// is cleared before the new key is recorded. Returns whether it was cleared.
pub async fn reconcile_embedding_model(
    store: &dyn RagStore,
    model_key: &str,
) -> Result<bool, ApiError> {
    let recorded = store.get_meta(META_EMBEDDING_MODEL).await?;
    if recorded.as_deref() == Some(model_key) {
        return Ok(false);
    }

    let stale = match recorded.as_deref() {
        Some(_) => true,
        None => store.count().await? > 0,
    };

    if stale {
        let removed = clear_knowledge_base(store).await?;
        tracing::warn!(
            previous = recorded.as_deref().unwrap_or("<unknown>"),
            current = model_key,
            removed,
            "Embedding model changed; knowledge base cleared"
        );
    }

    store.set_meta(META_EMBEDDING_MODEL, model_key).await?;
    Ok(stale)
}

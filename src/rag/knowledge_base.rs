//! Knowledge base: ingest, retrieve and clear over chunker + embedder + store.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunker::Chunker;
use super::embedder::Embedder;
use super::loader::{is_html, Document};
use super::store::{
    clear_knowledge_base, ChunkSearchResult, RagStore, SourceSummary, StoredChunk,
    META_LATEST_HTML, META_LATEST_HTML_SOURCE,
};
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub files: usize,
}

/// The most recently uploaded HTML page, kept whole for script generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlAsset {
    pub source: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KbStatus {
    pub chunk_count: usize,
    pub sources: Vec<SourceSummary>,
    pub embedding_model: String,
}

pub struct KnowledgeBase {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn RagStore>, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self {
            store,
            embedder,
            chunker,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Chunks, embeds and stores `documents`.
    ///
    /// All chunk texts go to the embedder in a single call. The chunks and the
    /// latest HTML page are written in one store transaction, so a failure
    /// writes nothing.
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport, ApiError> {
        let files = documents.len();
        let ingested_at = Utc::now().to_rfc3339();

        let chunks: Vec<StoredChunk> = documents
            .iter()
            .flat_map(|doc| self.chunker.split(doc))
            .map(|chunk| StoredChunk {
                chunk_id: Uuid::new_v4().to_string(),
                text: chunk.text,
                source: chunk.source,
                start_offset: chunk.start_offset,
                chunk_index: chunk.chunk_index,
                ingested_at: ingested_at.clone(),
            })
            .collect();

        if chunks.is_empty() {
            tracing::info!(files, "Upload produced no chunks");
            return Ok(IngestReport { chunks: 0, files });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(ApiError::Upstream(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let count = chunks.len();
        let meta: Vec<(&str, &str)> = documents
            .iter()
            .rev()
            .find(|doc| is_html(&doc.source))
            .map(|page| {
                vec![
                    (META_LATEST_HTML_SOURCE, page.source.as_str()),
                    (META_LATEST_HTML, page.content.as_str()),
                ]
            })
            .unwrap_or_default();
        self.store
            .insert_batch_with_meta(chunks.into_iter().zip(embeddings).collect(), &meta)
            .await?;

        tracing::info!(
            chunks = count,
            files,
            embedder = self.embedder.name(),
            "Ingested documents into knowledge base"
        );
        Ok(IngestReport {
            chunks: count,
            files,
        })
    }

    /// Top `k` chunks for `query`. An empty knowledge base short-circuits
    /// without embedding the query.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ChunkSearchResult>, ApiError> {
        if self.store.count().await? == 0 {
            tracing::debug!("Knowledge base is empty; skipping retrieval");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let results = self.store.search(&query_embedding, k).await?;
        tracing::debug!(k, hits = results.len(), "Retrieved context");
        Ok(results)
    }

    pub async fn latest_html(&self) -> Result<Option<HtmlAsset>, ApiError> {
        let source = self.store.get_meta(META_LATEST_HTML_SOURCE).await?;
        let content = self.store.get_meta(META_LATEST_HTML).await?;
        Ok(match (source, content) {
            (Some(source), Some(content)) => Some(HtmlAsset { source, content }),
            _ => None,
        })
    }

    pub async fn source_names(&self) -> Result<Vec<String>, ApiError> {
        Ok(self
            .store
            .sources()
            .await?
            .into_iter()
            .map(|s| s.source)
            .collect())
    }

    pub async fn status(&self) -> Result<KbStatus, ApiError> {
        Ok(KbStatus {
            chunk_count: self.store.count().await?,
            sources: self.store.sources().await?,
            embedding_model: self.embedder.model_key(),
        })
    }

    pub async fn clear(&self) -> Result<usize, ApiError> {
        let removed = clear_knowledge_base(self.store.as_ref()).await?;
        tracing::info!(removed, "Knowledge base cleared");
        Ok(removed)
    }
}

//! SQLite-backed RAG store implementation.
//!
//! Chunk text, source and offsets live in SQLite next to serialized
//! embeddings; search is a brute-force cosine scan. Everything sits in one
//! index directory that is reused in place across restarts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, RagStore, SourceSummary, StoredChunk};
use crate::core::errors::ApiError;
use crate::vector_math::rank_descending_by_cosine;

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    /// Opens (or creates) `rag.db` inside `index_dir`.
    pub async fn open(index_dir: &Path) -> Result<Self, ApiError> {
        std::fs::create_dir_all(index_dir).map_err(ApiError::internal)?;
        Self::with_path(index_dir.join("rag.db")).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!("RAG index opened at {}", db_path.display());
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                start_offset INTEGER NOT NULL DEFAULT 0,
                chunk_index INTEGER NOT NULL DEFAULT 0,
                embedding BLOB NOT NULL,
                ingested_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rag_source ON rag_chunks(source)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let start_offset: i64 = row.get("start_offset");
        let chunk_index: i64 = row.get("chunk_index");

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            text: row.get("content"),
            source: row.get("source"),
            start_offset: start_offset.max(0) as usize,
            chunk_index: chunk_index.max(0) as usize,
            ingested_at: row.get("ingested_at"),
        }
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn insert_batch_with_meta(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
        meta: &[(&str, &str)],
    ) -> Result<(), ApiError> {
        if items.is_empty() && meta.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO rag_chunks
                    (chunk_id, content, source, start_offset, chunk_index, embedding, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.text)
            .bind(&chunk.source)
            .bind(chunk.start_offset as i64)
            .bind(chunk.chunk_index as i64)
            .bind(&blob)
            .bind(&chunk.ingested_at)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        for (key, value) in meta {
            sqlx::query(
                "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
                 VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, start_offset, chunk_index, embedding, ingested_at
             FROM rag_chunks
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        let mut chunks = Vec::with_capacity(rows.len());
        let mut embeddings = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Vec<u8> = row.get("embedding");
            let embedding = Self::deserialize_embedding(&bytes);
            if embedding.len() != query_embedding.len() {
                continue;
            }
            chunks.push(Self::row_to_chunk(row));
            embeddings.push(embedding);
        }

        let skipped = rows.len() - chunks.len();
        if skipped > 0 {
            tracing::warn!(
                skipped,
                "Skipped chunks whose embedding dimension differs from the query"
            );
        }

        let results = rank_descending_by_cosine(query_embedding, &embeddings)
            .into_iter()
            .take(limit.max(1))
            .map(|(idx, score)| ChunkSearchResult {
                chunk: chunks[idx].clone(),
                score,
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn sources(&self) -> Result<Vec<SourceSummary>, ApiError> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS chunks
             FROM rag_chunks
             GROUP BY source
             ORDER BY source",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                SourceSummary {
                    source: row.get("source"),
                    chunks: chunks as usize,
                }
            })
            .collect())
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM rag_chunks")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        if let Err(err) = sqlx::query("VACUUM").execute(&self.pool).await {
            tracing::warn!("Failed to vacuum RAG index after clear: {}", err);
        }

        Ok(result.rows_affected() as usize)
    }

    async fn get_meta(&self, key: &str) -> Result<Option<String>, ApiError> {
        sqlx::query_scalar("SELECT value FROM rag_meta WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::internal)
    }

    async fn set_meta(&self, key: &str, value: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
             VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn delete_meta(&self, key: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM rag_meta WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }
}

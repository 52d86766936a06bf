//! Fixed-size sliding-window chunking.

use serde::{Deserialize, Serialize};

use super::loader::Document;
use crate::core::config::ChunkingSettings;
use crate::core::errors::ApiError;

/// A window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    /// Offset of the window start, in chars, within the document content.
    pub start_offset: usize,
    /// Position of the chunk among the chunks of its document.
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ApiError> {
        if chunk_size == 0 {
            return Err(ApiError::BadRequest(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(ApiError::BadRequest(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self, ApiError> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Splits a document into overlapping windows of `chunk_size` chars.
    ///
    /// Consecutive windows start `chunk_size - chunk_overlap` chars apart and
    /// splitting stops at the first window that reaches the end of the text.
    /// Whitespace-only windows are dropped.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.content.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        if total_chars == 0 {
            return chunks;
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut start = 0;

        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            let text: String = chars[start..end].iter().collect();

            if !text.trim().is_empty() {
                chunks.push(Chunk {
                    text,
                    source: document.source.clone(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

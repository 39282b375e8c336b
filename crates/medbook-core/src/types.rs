//! Domain types flowing through the indexing and answering pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key every loaded document carries: the basename of the file it
/// came from.
pub const SOURCE_KEY: &str = "source";

/// A loaded source document. Pipeline stages consume and produce documents
/// rather than mutating them in place; content is immutable once normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Meta) -> Self {
        Self { content: content.into(), metadata }
    }

    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map_or("unknown", String::as_str)
    }
}

/// A bounded-length segment of a source document, the atomic unit of
/// embedding and retrieval.
///
/// - `id`: `"{source_stem}:{chunk_index}"`, unique within a corpus
/// - `metadata`: inherited from the source document, unmodified
/// - `chunk_index`/`total_chunks`: position within the parent document;
///   in-document order is never reordered downstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub content: String,
    pub metadata: Meta,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl DocumentChunk {
    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map_or("unknown", String::as_str)
    }
}

/// A chunk returned by a similarity query, in the index's own rank order.
/// `score` is a similarity (higher is better); downstream code must not
/// re-sort or re-rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: Meta,
    pub score: f32,
}

impl RetrievedChunk {
    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map_or("unknown", String::as_str)
    }
}

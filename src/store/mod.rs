// Vector store module
// Chunk persistence and cosine similarity search over pluggable backends

#[cfg(test)]
mod tests;

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chunking::Chunk;
use crate::config::{Config, StoreKind};
use crate::loader::DocumentType;
use crate::{RagError, Result};

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// A chunk owned by the vector store: the chunk itself plus the
/// store-assigned id, its embedding, and the storage timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
    pub stored_at: String,
}

/// Result of a similarity search or retrieval call. `scores` is parallel
/// to `chunks`; both are ordered by descending similarity.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub chunks: Vec<StoredChunk>,
    pub scores: Vec<f32>,
    pub query_embedding: Vec<f32>,
}

/// Document-type filter applied during search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    Any,
    Only(DocumentType),
    Excluding(DocumentType),
}

impl TypeFilter {
    #[inline]
    pub fn matches(self, doc_type: DocumentType) -> bool {
        match self {
            Self::Any => true,
            Self::Only(wanted) => doc_type == wanted,
            Self::Excluding(unwanted) => doc_type != unwanted,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub types: TypeFilter,
    pub source: Option<String>,
}

impl SearchFilter {
    fn matches(&self, stored: &StoredChunk) -> bool {
        self.types.matches(stored.chunk.metadata.doc_type)
            && self
                .source
                .as_deref()
                .is_none_or(|source| stored.chunk.source == source)
    }
}

/// Persistence interface the store facade runs on. Any key/value or
/// document store that can hold `{id, vector, text, metadata}` records and
/// return them all qualifies; ranking happens in [`VectorStore`].
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn put(&self, record: StoredChunk) -> Result<()>;

    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<StoredChunk>>;

    async fn ping(&self) -> Result<()>;
}

/// Vector store facade: owns dimension enforcement, id assignment, and
/// cosine ranking, independent of the storage engine behind it.
#[derive(Clone)]
pub struct VectorStore {
    backend: Arc<dyn StoreBackend>,
    dimension: usize,
}

impl VectorStore {
    #[inline]
    pub fn new(backend: Arc<dyn StoreBackend>, dimension: usize) -> Self {
        Self { backend, dimension }
    }

    /// In-memory store, mainly for tests and local experimentation.
    #[inline]
    pub fn in_memory(dimension: usize) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), dimension)
    }

    /// Build the store with the backend selected by configuration.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Arc<dyn StoreBackend> = match config.store.backend {
            StoreKind::Memory => Arc::new(MemoryBackend::new()),
            StoreKind::Http => {
                let endpoint = config.store.endpoint.as_deref().ok_or_else(|| {
                    RagError::Config("http store backend requires an endpoint".to_string())
                })?;
                Arc::new(HttpBackend::new(endpoint)?)
            }
        };
        Ok(Self::new(backend, config.embedding.dimension))
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Persist a chunk with its embedding. Returns the store-assigned id,
    /// stable for the chunk's lifetime. Re-ingestion creates new records;
    /// deduplication is a backend concern.
    #[inline]
    pub async fn store_chunk(&self, chunk: Chunk, embedding: Vec<f32>) -> Result<String> {
        if embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let record = StoredChunk {
            id: Uuid::new_v4().to_string(),
            chunk,
            embedding,
            stored_at: Utc::now().to_rfc3339(),
        };
        let id = record.id.clone();

        self.backend.put(record).await?;
        debug!("Stored chunk {}", id);
        Ok(id)
    }

    /// Find the `k` nearest stored chunks by cosine similarity.
    ///
    /// A query of the wrong dimension aborts rather than producing
    /// meaningless scores. Stored vectors with zero norm (failed
    /// embeddings) are excluded rather than scoring as NaN. Results are
    /// sorted by descending similarity with ties kept in insertion order,
    /// so identical inputs always rank identically.
    #[inline]
    pub async fn search_similar(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_similarity: Option<f32>,
        filter: &SearchFilter,
    ) -> Result<RetrievalResult> {
        if query_embedding.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }

        let all_chunks = self.backend.fetch(None).await?;
        let mut hits: Vec<(StoredChunk, f32)> = Vec::new();

        for stored in all_chunks {
            if !filter.matches(&stored) {
                continue;
            }

            if stored.embedding.len() != self.dimension {
                warn!(
                    "Skipping stored chunk {} with dimension {} (store dimension {})",
                    stored.id,
                    stored.embedding.len(),
                    self.dimension
                );
                continue;
            }

            if is_zero_norm(&stored.embedding) {
                continue;
            }

            let score = cosine_similarity(query_embedding, &stored.embedding);
            if min_similarity.is_some_and(|min| score < min) {
                continue;
            }

            hits.push((stored, score));
        }

        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(k);

        debug!("Similarity search returned {} of at most {} hits", hits.len(), k);

        let mut result = RetrievalResult {
            query_embedding: query_embedding.to_vec(),
            ..RetrievalResult::default()
        };
        for (stored, score) in hits {
            result.chunks.push(stored);
            result.scores.push(score);
        }
        Ok(result)
    }

    #[inline]
    pub async fn get_all_chunks(&self, limit: Option<usize>) -> Result<Vec<StoredChunk>> {
        self.backend.fetch(limit).await
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        Ok(self.backend.fetch(None).await?.len())
    }

    #[inline]
    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Vector store health check failed: {}", e);
                false
            }
        }
    }
}

/// Cosine similarity: dot(a, b) / (‖a‖ · ‖b‖), in [-1, 1].
///
/// Returns 0.0 when either vector has zero norm; search excludes such
/// vectors before scoring.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        return 0.0;
    }

    dot / denominator
}

fn is_zero_norm(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

// Retrieval module
// Semantic search over the vector store, with multi-query fusion


use std::collections::HashMap;

use itertools::Itertools;
use tracing::debug;

use crate::embeddings::EmbeddingService;
use crate::loader::DocumentType;
use crate::store::{RetrievalResult, SearchFilter, StoredChunk, TypeFilter, VectorStore};
use crate::{RagError, Result};

/// Default similarity floor for documentation retrieval.
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.3;

/// Schema chunks are terser than prose and are held to a lower bar.
pub const SCHEMA_MIN_SIMILARITY: f32 = 0.25;

#[derive(Debug, Clone, Default)]
pub struct RetrievalOptions {
    /// Maximum number of chunks to return. Zero falls back to 10.
    pub limit: usize,
    /// Similarity floor; chunks below it are dropped entirely. `None`
    /// applies the preset default.
    pub min_similarity: Option<f32>,
    pub filter: SearchFilter,
}

impl RetrievalOptions {
    fn effective_limit(&self) -> usize {
        if self.limit == 0 { 10 } else { self.limit }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AvailabilityStatus {
    pub store: bool,
    pub embedder: bool,
}

/// Semantic search facade: embeds queries and ranks stored chunks.
///
/// This and the context formatter are the only surface downstream
/// consumers (generation, complexity estimation) call.
#[derive(Clone)]
pub struct RetrievalService {
    embedder: EmbeddingService,
    store: VectorStore,
}

impl RetrievalService {
    #[inline]
    pub fn new(embedder: EmbeddingService, store: VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Retrieve the chunks most similar to a single query.
    #[inline]
    pub async fn retrieve(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult> {
        let query_embedding = self.embedder.generate_embedding(query)?;
        let min_similarity = options.min_similarity.unwrap_or(DEFAULT_MIN_SIMILARITY);

        let result = self
            .store
            .search_similar(
                &query_embedding,
                options.effective_limit(),
                Some(min_similarity),
                &options.filter,
            )
            .await?;

        debug!(
            "Retrieved {} chunks for query ({} chars)",
            result.chunks.len(),
            query.len()
        );
        Ok(result)
    }

    /// Retrieve for several queries at once, fusing by the per-chunk
    /// maximum score across queries.
    ///
    /// Max-of-queries favors chunks strongly relevant to any one sub-query
    /// over chunks mildly relevant to all of them, which suits
    /// multi-faceted questions. The fused list is deduplicated by chunk id,
    /// re-sorted, and truncated to the limit.
    #[inline]
    pub async fn retrieve_multiple(
        &self,
        queries: &[String],
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult> {
        if queries.is_empty() {
            return Err(RagError::Input("at least one query is required".to_string()));
        }

        let limit = options.effective_limit();
        let mut fused: Vec<(StoredChunk, f32)> = Vec::new();
        let mut position_by_id: HashMap<String, usize> = HashMap::new();

        for query in queries {
            // Oversample per query so deduplication cannot starve the limit
            let per_query = RetrievalOptions {
                limit: limit * 2,
                min_similarity: options.min_similarity,
                filter: options.filter.clone(),
            };
            let result = self.retrieve(query, &per_query).await?;

            for (stored, score) in result.chunks.into_iter().zip(result.scores) {
                match position_by_id.get(&stored.id) {
                    Some(&position) => {
                        if score > fused[position].1 {
                            fused[position].1 = score;
                        }
                    }
                    None => {
                        position_by_id.insert(stored.id.clone(), fused.len());
                        fused.push((stored, score));
                    }
                }
            }
        }

        // Stable sort keeps first-seen order on ties, so results are
        // deterministic for identical inputs
        fused.sort_by(|a, b| b.1.total_cmp(&a.1));
        fused.truncate(limit);

        let joined = queries.iter().join(" ");
        let query_embedding = self.embedder.generate_embedding(&joined)?;

        let mut result = RetrievalResult {
            query_embedding,
            ..RetrievalResult::default()
        };
        for (stored, score) in fused {
            result.chunks.push(stored);
            result.scores.push(score);
        }

        debug!(
            "Fused {} queries into {} chunks",
            queries.len(),
            result.chunks.len()
        );
        Ok(result)
    }

    /// Retrieval narrowed to schema chunks, with the lower schema
    /// similarity floor unless overridden.
    #[inline]
    pub async fn retrieve_schema_context(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult> {
        let narrowed = RetrievalOptions {
            limit: options.limit,
            min_similarity: Some(options.min_similarity.unwrap_or(SCHEMA_MIN_SIMILARITY)),
            filter: SearchFilter {
                types: TypeFilter::Only(DocumentType::Schema),
                source: options.filter.source.clone(),
            },
        };
        self.retrieve(query, &narrowed).await
    }

    /// Retrieval over everything except schema chunks.
    #[inline]
    pub async fn retrieve_documentation_context(
        &self,
        query: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult> {
        let narrowed = RetrievalOptions {
            limit: options.limit,
            min_similarity: Some(options.min_similarity.unwrap_or(DEFAULT_MIN_SIMILARITY)),
            filter: SearchFilter {
                types: TypeFilter::Excluding(DocumentType::Schema),
                source: options.filter.source.clone(),
            },
        };
        self.retrieve(query, &narrowed).await
    }

    /// Probe both collaborators.
    #[inline]
    pub async fn check_availability(&self) -> AvailabilityStatus {
        let store = self.store.health_check().await;
        let embedder = self.embedder.generate_embedding("availability probe").is_ok();
        AvailabilityStatus { store, embedder }
    }
}

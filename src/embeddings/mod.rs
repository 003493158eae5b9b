// Embeddings module
// Provider abstraction plus the batching/retry/backoff service layer


pub mod local;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::{EmbeddingConfig, ProviderKind};
use crate::{RagError, Result};

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

/// Default embedding dimension, matching all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Capability interface for a text-to-vector backend.
///
/// One implementation per backend, selected by configuration at
/// construction time, so the rest of the pipeline never branches on
/// provider identity. Implementations may block; the async surface
/// (delays, retries, cancellation) lives in [`EmbeddingService`].
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, preserving input order and length.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed dimensionality of every vector this provider produces.
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

/// One failed batch within a [`EmbeddingService::generate_embeddings`] call.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub batch_index: usize,
    pub message: String,
}

/// Result of a batched embedding call. `embeddings` is aligned 1:1 with the
/// input texts; blank inputs and positions belonging to a failed batch
/// resolve to empty vectors so callers can skip them positionally.
#[derive(Debug, Default)]
pub struct EmbeddingBatch {
    pub embeddings: Vec<Vec<f32>>,
    pub failures: Vec<BatchFailure>,
}

/// Batching and retry orchestration over an [`EmbeddingProvider`].
///
/// Batches are processed strictly sequentially with an inter-batch delay,
/// trading throughput for reliability against a shared, quota-limited
/// backend. A rate-limited batch is retried exactly once.
#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    batch_delay: Duration,
    retry_delay: Duration,
}

impl EmbeddingService {
    #[inline]
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            batch_delay: DEFAULT_BATCH_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Build the service with the provider selected by configuration.
    #[inline]
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = match config.provider {
            ProviderKind::Remote => Arc::new(RemoteEmbedder::new(config)?),
            ProviderKind::Local => Arc::new(LocalEmbedder::new(config.dimension)?),
        };
        Ok(Self {
            provider,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    #[inline]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    #[inline]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    #[inline]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate an embedding for a single text.
    ///
    /// Fails with an input error on blank text. No automatic retry; the
    /// batch path is the only place the core retries.
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RagError::Input("text cannot be empty".to_string()));
        }

        let vectors = self.embed_checked(&[trimmed.to_string()])?;
        vectors.into_iter().next().ok_or_else(|| {
            RagError::BackendUnavailable("embedding backend returned no vectors".to_string())
        })
    }

    /// Generate embeddings for multiple texts.
    ///
    /// The output is aligned with the input: blank texts and texts in a
    /// failed batch come back as empty vectors, and batch-level failures
    /// are reported in [`EmbeddingBatch::failures`] while the remaining
    /// batches continue. Authentication failures abort the whole call; so
    /// does every batch failing.
    #[inline]
    pub async fn generate_embeddings(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<EmbeddingBatch> {
        let mut batch = EmbeddingBatch {
            embeddings: vec![Vec::new(); texts.len()],
            failures: Vec::new(),
        };
        if texts.is_empty() {
            return Ok(batch);
        }

        let valid: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| (i, trimmed.to_string()))
            })
            .collect();
        if valid.is_empty() {
            return Ok(batch);
        }

        let batch_size = batch_size.max(1);
        let batch_count = valid.len().div_ceil(batch_size);
        debug!(
            "Generating embeddings for {} texts in {} batches",
            valid.len(),
            batch_count
        );

        for (batch_index, items) in valid.chunks(batch_size).enumerate() {
            if batch_index > 0 {
                sleep(self.batch_delay).await;
            }

            let batch_texts: Vec<String> = items.iter().map(|(_, text)| text.clone()).collect();
            match self.embed_with_retry(&batch_texts, batch_index).await {
                Ok(vectors) => {
                    for ((index, _), vector) in items.iter().zip(vectors) {
                        batch.embeddings[*index] = vector;
                    }
                }
                Err(RagError::Auth(message)) => {
                    error!("Embedding backend rejected credentials: {}", message);
                    return Err(RagError::Auth(message));
                }
                Err(e) => {
                    warn!("Embedding batch {} failed: {}", batch_index, e);
                    batch.failures.push(BatchFailure {
                        batch_index,
                        message: e.to_string(),
                    });
                }
            }
        }

        if batch.failures.len() == batch_count {
            return Err(RagError::BackendUnavailable(format!(
                "all {} embedding batches failed",
                batch_count
            )));
        }

        Ok(batch)
    }

    /// Call the provider, waiting out one rate-limit signal before giving
    /// up on the batch.
    async fn embed_with_retry(
        &self,
        batch_texts: &[String],
        batch_index: usize,
    ) -> Result<Vec<Vec<f32>>> {
        match self.embed_checked(batch_texts) {
            Err(RagError::RateLimited(message)) => {
                warn!(
                    "Rate limited on batch {} ({}), retrying once in {:?}",
                    batch_index, message, self.retry_delay
                );
                sleep(self.retry_delay).await;
                self.embed_checked(batch_texts)
            }
            other => other,
        }
    }

    /// Provider call with count and dimension validation. A vector of the
    /// wrong dimension is a hard error, never a silent truncation.
    fn embed_checked(&self, batch_texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.provider.embed_batch(batch_texts)?;

        if vectors.len() != batch_texts.len() {
            return Err(RagError::BackendUnavailable(format!(
                "embedding backend returned {} vectors for {} inputs",
                vectors.len(),
                batch_texts.len()
            )));
        }

        let expected = self.provider.dimension();
        for vector in &vectors {
            if vector.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }
}

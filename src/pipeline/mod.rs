// Ingestion pipeline module
// Orchestrates Loader → Chunker → Embedder → Store with progress tracking
// and partial-failure bookkeeping


use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::chunking::{self, ChunkingConfig};
use crate::embeddings::EmbeddingService;
use crate::loader::{self, DirectoryOptions, Document};
use crate::store::VectorStore;
use crate::{RagError, Result};

const DEFAULT_BATCH_SIZE: usize = 16;
const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestionPhase {
    #[default]
    Pending,
    Chunking,
    Embedding,
    Storing,
    Done,
}

#[derive(Debug, Clone)]
pub struct IngestionFailure {
    pub document_id: String,
    pub message: String,
}

/// Snapshot of an ingestion run, emitted to the progress callback after
/// every processed chunk. Counters only ever increase within a run, and
/// all run state is local to the invocation, so concurrent runs cannot
/// corrupt each other's counters.
#[derive(Debug, Clone, Default)]
pub struct IngestionProgress {
    pub phase: IngestionPhase,
    pub total_documents: usize,
    pub processed_documents: usize,
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub embedded_chunks: usize,
    pub stored_chunks: usize,
    pub errors: Vec<IngestionFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionOutcome {
    Completed,
    /// Some chunks stored, some failed. Ingestion is resumable rather than
    /// all-or-nothing, so this still counts as a success.
    Partial,
    Failed,
}

impl IngestionProgress {
    #[inline]
    pub fn outcome(&self) -> IngestionOutcome {
        if self.stored_chunks == 0 {
            IngestionOutcome::Failed
        } else if self.errors.is_empty() {
            IngestionOutcome::Completed
        } else {
            IngestionOutcome::Partial
        }
    }

    /// A run that stored at least one chunk succeeded, even with errors.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.stored_chunks > 0
    }
}

pub type ProgressCallback = Box<dyn Fn(&IngestionProgress) + Send + Sync>;

#[derive(Default)]
pub struct IngestionOptions {
    pub on_progress: Option<ProgressCallback>,
    /// Checked between chunk batches, never mid-batch. Flip the sender to
    /// `true` to stop the run; partial progress is returned.
    pub cancel: Option<watch::Receiver<bool>>,
}

/// External schema provider (e.g. a GraphQL introspection client). The
/// pipeline consumes the returned text; it never produces schemas itself.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn introspect(&self) -> Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub by_type: HashMap<String, usize>,
    pub by_source: HashMap<String, usize>,
}

/// End-to-end ingestion: load → chunk → embed → store.
///
/// Chunk batches run strictly sequentially; the embedding service handles
/// the single rate-limit retry within each batch, and every per-chunk
/// failure is recorded while the run continues.
pub struct IngestionPipeline {
    chunking: ChunkingConfig,
    embedder: EmbeddingService,
    store: VectorStore,
    batch_size: usize,
    batch_delay: Duration,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(embedder: EmbeddingService, store: VectorStore) -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    #[inline]
    pub fn with_chunking(mut self, config: ChunkingConfig) -> Self {
        self.chunking = config;
        self
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[inline]
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Ingest every recognized file under a directory. Loader failures for
    /// individual files are recorded and the rest proceed.
    #[inline]
    pub async fn ingest_directory(
        &self,
        path: &Path,
        dir_options: &DirectoryOptions,
        options: &IngestionOptions,
    ) -> Result<IngestionProgress> {
        let outcome = loader::load_directory(path, dir_options).await?;

        let mut progress = IngestionProgress::default();
        for failure in outcome.errors {
            progress.errors.push(IngestionFailure {
                document_id: failure.path,
                message: failure.message,
            });
        }

        self.ingest_into(outcome.documents, &mut progress, options)
            .await?;
        Ok(progress)
    }

    /// Ingest already-loaded documents.
    #[inline]
    pub async fn ingest_documents(
        &self,
        documents: Vec<Document>,
        options: &IngestionOptions,
    ) -> Result<IngestionProgress> {
        let mut progress = IngestionProgress::default();
        self.ingest_into(documents, &mut progress, options).await?;
        Ok(progress)
    }

    /// Introspect a schema source and ingest the result as a schema-typed
    /// document. A failing source is recorded, not propagated, so the run
    /// reports like any other partial failure.
    #[inline]
    pub async fn ingest_schema(
        &self,
        source: &dyn SchemaSource,
        id: &str,
        options: &IngestionOptions,
    ) -> Result<IngestionProgress> {
        let mut progress = IngestionProgress::default();

        let text = match source.introspect().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Schema introspection failed: {}", e);
                progress.total_documents = 1;
                progress.errors.push(IngestionFailure {
                    document_id: id.to_string(),
                    message: e.to_string(),
                });
                progress.phase = IngestionPhase::Done;
                emit(options, &progress);
                return Ok(progress);
            }
        };

        let document = match loader::load_schema(&text, id) {
            Ok(document) => document,
            Err(e) => {
                progress.total_documents = 1;
                progress.errors.push(IngestionFailure {
                    document_id: id.to_string(),
                    message: e.to_string(),
                });
                progress.phase = IngestionPhase::Done;
                emit(options, &progress);
                return Ok(progress);
            }
        };

        self.ingest_into(vec![document], &mut progress, options)
            .await?;
        Ok(progress)
    }

    /// Chunk counts grouped by document type and source.
    #[inline]
    pub async fn stats(&self) -> Result<StoreStats> {
        let chunks = self.store.get_all_chunks(None).await?;

        let by_type = chunks
            .iter()
            .map(|c| c.chunk.metadata.doc_type.as_str().to_string())
            .counts();
        let by_source = chunks.iter().map(|c| c.chunk.source.clone()).counts();

        Ok(StoreStats {
            total_chunks: chunks.len(),
            by_type,
            by_source,
        })
    }

    async fn ingest_into(
        &self,
        documents: Vec<Document>,
        progress: &mut IngestionProgress,
        options: &IngestionOptions,
    ) -> Result<()> {
        progress.total_documents += documents.len();
        progress.phase = IngestionPhase::Chunking;

        let mut all_chunks = Vec::new();
        for document in &documents {
            match chunking::chunk_document(document, &self.chunking) {
                Ok(chunks) => all_chunks.extend(chunks),
                Err(e) => progress.errors.push(IngestionFailure {
                    document_id: document.id.clone(),
                    message: e.to_string(),
                }),
            }
            progress.processed_documents += 1;
        }
        progress.total_chunks += all_chunks.len();
        emit(options, progress);

        if all_chunks.is_empty() {
            warn!("No chunks generated from {} documents", documents.len());
            progress.phase = IngestionPhase::Done;
            emit(options, progress);
            return Ok(());
        }

        for (batch_index, batch) in all_chunks.chunks(self.batch_size).enumerate() {
            if batch_index > 0 {
                sleep(self.batch_delay).await;
            }

            if is_cancelled(options) {
                warn!("Ingestion cancelled before batch {}", batch_index);
                progress.errors.push(IngestionFailure {
                    document_id: "ingestion".to_string(),
                    message: format!("cancelled before batch {batch_index}"),
                });
                break;
            }

            progress.phase = IngestionPhase::Embedding;
            let texts: Vec<String> = batch.iter().map(|c| c.chunk_text.clone()).collect();

            let embeddings = match self.embedder.generate_embeddings(&texts, batch.len()).await {
                Ok(result) => result.embeddings,
                Err(e) => {
                    let fatal = matches!(e, RagError::Auth(_));
                    for chunk in batch {
                        progress.errors.push(IngestionFailure {
                            document_id: chunk.metadata.document_id.clone(),
                            message: e.to_string(),
                        });
                        progress.processed_chunks += 1;
                        emit(options, progress);
                    }
                    if fatal {
                        // credentials will not heal mid-run
                        break;
                    }
                    continue;
                }
            };

            progress.phase = IngestionPhase::Storing;
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                if embedding.is_empty() {
                    debug!(
                        "Skipping chunk {} of {} with no embedding",
                        chunk.chunk_index, chunk.metadata.document_id
                    );
                    progress.processed_chunks += 1;
                    emit(options, progress);
                    continue;
                }
                progress.embedded_chunks += 1;

                match self.store.store_chunk(chunk.clone(), embedding).await {
                    Ok(id) => {
                        progress.stored_chunks += 1;
                        debug!("Stored chunk {} as {}", chunk.chunk_index, id);
                    }
                    Err(e) => progress.errors.push(IngestionFailure {
                        document_id: chunk.metadata.document_id.clone(),
                        message: e.to_string(),
                    }),
                }
                progress.processed_chunks += 1;
                emit(options, progress);
            }
        }

        progress.phase = IngestionPhase::Done;
        emit(options, progress);

        info!(
            "Ingestion finished: {}/{} chunks stored, {} errors",
            progress.stored_chunks,
            progress.total_chunks,
            progress.errors.len()
        );
        Ok(())
    }
}

fn emit(options: &IngestionOptions, progress: &IngestionProgress) {
    if let Some(callback) = &options.on_progress {
        callback(progress);
    }
}

fn is_cancelled(options: &IngestionOptions) -> bool {
    options.cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

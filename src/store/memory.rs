use std::sync::RwLock;

use async_trait::async_trait;

use super::{StoreBackend, StoredChunk};
use crate::{RagError, Result};

/// In-process backend holding chunks in insertion order.
///
/// Reads share the lock and appends hold it only for the push, so
/// concurrent retrieval calls and ingestion runs never serialize on each
/// other beyond that. A search that races an append may or may not see the
/// new chunk; eventual visibility is all the contract asks for.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    chunks: RwLock<Vec<StoredChunk>>,
}

impl MemoryBackend {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn put(&self, record: StoredChunk) -> Result<()> {
        let mut chunks = self
            .chunks
            .write()
            .map_err(|_| RagError::BackendUnavailable("memory store lock poisoned".to_string()))?;
        chunks.push(record);
        Ok(())
    }

    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<StoredChunk>> {
        let chunks = self
            .chunks
            .read()
            .map_err(|_| RagError::BackendUnavailable("memory store lock poisoned".to_string()))?;
        let take = limit.unwrap_or(chunks.len());
        Ok(chunks.iter().take(take).cloned().collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

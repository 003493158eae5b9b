#[cfg(test)]
mod tests;

use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic in-process embedder.
///
/// Hashes each lowercased alphanumeric term into a signed slot of the
/// output vector, then L2-normalizes. Nowhere near a real language model,
/// but it satisfies the same contract and dimensionality as the remote
/// provider, so ingestion and retrieval work without network access and
/// identical texts always map to identical vectors. FNV-1a is written out
/// here because the hash must be stable across runs, which the std hasher
/// does not guarantee.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimension: usize,
}

impl LocalEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::Config(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for term in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|term| !term.is_empty())
        {
            let hash = fnv1a(term.as_bytes());
            let index = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for LocalEmbedder {
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn name(&self) -> &str {
        "local"
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

// Configuration management module
// TOML configuration for the embedding provider, chunking, store, and
// retrieval defaults

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;
use crate::embeddings::DEFAULT_EMBEDDING_DIMENSION;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
}

/// Which embedding backend to construct. The rest of the pipeline works
/// against the provider trait and never branches on this again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    /// Base URL of the inference router; the model name is appended.
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    /// Optional bearer token. The public endpoint works without one but is
    /// rate-limited more aggressively.
    pub api_key: Option<String>,
    pub batch_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            provider: ProviderKind::Remote,
            endpoint: "https://router.huggingface.co/hf-inference/models".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 16,
            api_key: None,
            batch_delay_ms: 2000,
            retry_delay_ms: 10_000,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreKind,
    /// Base URL of the key/value document store; required for `http`.
    pub endpoint: Option<String>,
}

impl Default for StoreConfig {
    #[inline]
    fn default() -> Self {
        Self {
            backend: StoreKind::Memory,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub limit: usize,
    pub min_similarity: f32,
    /// Schema chunks are terser and are held to a lower bar.
    pub schema_min_similarity: f32,
    pub context_max_tokens: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            limit: 10,
            min_similarity: 0.3,
            schema_min_similarity: 0.25,
            context_max_tokens: 4000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(usize),
    #[error("Invalid embedding dimension: {0} (must be between 16 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid max chunk tokens: {0} (must be between 16 and 8192)")]
    InvalidMaxTokens(usize),
    #[error("Chunk overlap ({0}) must be smaller than max chunk tokens ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid similarity threshold: {0} (must be between -1 and 1)")]
    InvalidSimilarity(f32),
    #[error("Invalid retrieval limit: {0} (must be at least 1)")]
    InvalidLimit(usize),
    #[error("Invalid context budget: {0} (must be at least 16 tokens)")]
    InvalidContextBudget(usize),
    #[error("HTTP store backend requires an endpoint")]
    MissingStoreEndpoint,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory (`~/.graphq-rag`, falling back to
    /// the platform data directory).
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".graphq-rag"))
            .or_else(|| dirs::data_dir().map(|data| data.join("graphq-rag")))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        Self::load_from(&config_dir)
    }

    /// Load configuration from a directory. A missing config file yields
    /// the defaults.
    #[inline]
    pub fn load_from(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir().context("Failed to determine config directory")?;
        self.save_to(&config_dir)
    }

    #[inline]
    pub fn save_to(&self, config_dir: &Path) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.store.validate()?;
        self.retrieval.validate()?;
        self.validate_chunking()?;
        Ok(())
    }

    fn validate_chunking(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;

        if !(16..=8192).contains(&chunking.max_tokens) {
            return Err(ConfigError::InvalidMaxTokens(chunking.max_tokens));
        }

        if chunking.overlap_tokens >= chunking.max_tokens {
            return Err(ConfigError::OverlapTooLarge(
                chunking.overlap_tokens,
                chunking.max_tokens,
            ));
        }

        Ok(())
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(16..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        self.model_endpoint()?;
        Ok(())
    }

    /// Full URL of the embedding endpoint for the configured model.
    #[inline]
    pub fn model_endpoint(&self) -> Result<Url, ConfigError> {
        let raw = format!("{}/{}", self.endpoint.trim_end_matches('/'), self.model);
        Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(raw))
    }
}

impl StoreConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StoreKind::Http {
            let endpoint = self
                .endpoint
                .as_deref()
                .ok_or(ConfigError::MissingStoreEndpoint)?;
            Url::parse(endpoint).map_err(|_| ConfigError::InvalidUrl(endpoint.to_string()))?;
        }
        Ok(())
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::InvalidLimit(self.limit));
        }

        for threshold in [self.min_similarity, self.schema_min_similarity] {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidSimilarity(threshold));
            }
        }

        if self.context_max_tokens < 16 {
            return Err(ConfigError::InvalidContextBudget(self.context_max_tokens));
        }

        Ok(())
    }
}

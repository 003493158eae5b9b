use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{StoreBackend, StoredChunk};
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Backend speaking to a key/value document store over REST.
///
/// The store only needs three routes: `POST {base}/v1/chunks` to commit a
/// record, `GET {base}/v1/chunks` to list them, and `GET {base}/v1/health`.
/// Ranking stays client-side in the facade, so any document store that can
/// round-trip JSON records qualifies.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: String,
    agent: ureq::Agent,
}

impl HttpBackend {
    #[inline]
    pub fn new(endpoint: &str) -> Result<Self> {
        let base = endpoint.trim_end_matches('/').to_string();
        Url::parse(&base)
            .map_err(|_| RagError::Config(format!("invalid store endpoint: {endpoint}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self { base, agent })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }
}

#[async_trait]
impl StoreBackend for HttpBackend {
    async fn put(&self, record: StoredChunk) -> Result<()> {
        let url = format!("{}/v1/chunks", self.base);
        let body = serde_json::to_string(&record)
            .map_err(|e| RagError::Input(format!("failed to serialize chunk record: {e}")))?;

        debug!("Committing chunk {} to {}", record.id, url);

        self.agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&body)
            .map_err(store_unavailable)?;

        Ok(())
    }

    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<StoredChunk>> {
        let url = match limit {
            Some(n) => format!("{}/v1/chunks?limit={n}", self.base),
            None => format!("{}/v1/chunks", self.base),
        };

        let body = self
            .agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(store_unavailable)?;

        let mut records: Vec<StoredChunk> = serde_json::from_str(&body).map_err(|e| {
            RagError::BackendUnavailable(format!("invalid response from chunk store: {e}"))
        })?;

        // The server may ignore the limit parameter
        if let Some(n) = limit {
            records.truncate(n);
        }

        debug!("Fetched {} chunks from store", records.len());
        Ok(records)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/v1/health", self.base);
        self.agent
            .get(url.as_str())
            .call()
            .map_err(store_unavailable)?;
        Ok(())
    }
}

fn store_unavailable(error: ureq::Error) -> RagError {
    RagError::BackendUnavailable(format!("chunk store request failed: {error}"))
}

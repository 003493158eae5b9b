
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embeddings::EmbeddingProvider;
use crate::{RagError, Result};

/// Client for a remote feature-extraction endpoint.
///
/// Speaks the inference-router convention: POST `{"inputs": [...]}` to
/// `{endpoint}/{model}`, receiving one vector per input. Failures are
/// classified by HTTP status so the service layer can decide
/// retry-versus-fail.
#[derive(Debug, Clone)]
pub struct RemoteEmbedder {
    endpoint: Url,
    dimension: usize,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

impl RemoteEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .model_endpoint()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            dimension: config.dimension,
            api_key: config.api_key.clone(),
            agent,
        })
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

impl EmbeddingProvider for RemoteEmbedder {
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request_json = serde_json::to_string(&EmbedRequest { inputs: texts })
            .map_err(|e| RagError::Input(format!("failed to serialize embedding request: {e}")))?;

        debug!(
            "Requesting {} embeddings from {}",
            texts.len(),
            self.endpoint
        );

        let mut request = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", &format!("Bearer {key}"));
        }

        let response_text = request
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(classify_error)?;

        parse_embeddings(&response_text, texts.len())
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn name(&self) -> &str {
        "remote"
    }
}

/// Map a transport-level failure into the retry taxonomy: 429 and 503
/// (model loading) are retryable, credential rejections are not, and
/// everything else means the backend is unreachable.
fn classify_error(error: ureq::Error) -> RagError {
    match error {
        ureq::Error::StatusCode(status) => classify_status(status),
        other => RagError::BackendUnavailable(other.to_string()),
    }
}

fn classify_status(status: u16) -> RagError {
    match status {
        429 => RagError::RateLimited(format!("HTTP {status}: embedding backend rate limit")),
        503 => RagError::RateLimited(format!("HTTP {status}: embedding model is loading")),
        401 | 403 => RagError::Auth(format!(
            "HTTP {status}: embedding backend rejected credentials"
        )),
        _ => RagError::BackendUnavailable(format!("HTTP {status} from embedding backend")),
    }
}

/// The endpoint returns `[[f32]]` for a batch, but may flatten to a single
/// `[f32]` when the batch held one text.
fn parse_embeddings(body: &str, input_len: usize) -> Result<Vec<Vec<f32>>> {
    if let Ok(vectors) = serde_json::from_str::<Vec<Vec<f32>>>(body) {
        return Ok(vectors);
    }

    if input_len == 1 {
        if let Ok(vector) = serde_json::from_str::<Vec<f32>>(body) {
            return Ok(vec![vector]);
        }
    }

    Err(RagError::BackendUnavailable(
        "invalid response format from embedding backend".to_string(),
    ))
}

//! Embedding backends used to index documents and embed queries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formfill_core::{EmbeddingBackend, EmbeddingConfig};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::AiError;

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AiError> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(AiError::EmptyResponse)
    }
}

/// Inputs per embedding request when embedding a whole corpus.
pub const EMBED_BATCH_SIZE: usize = 256;

/// Embed `texts` in requests of at most [`EMBED_BATCH_SIZE`] inputs.
/// `progress` receives the running count after each request.
pub async fn embed_batched(
    model: &dyn EmbeddingModel,
    texts: &[String],
    mut progress: impl FnMut(usize),
) -> Result<Vec<Vec<f32>>, AiError> {
    let mut embeddings = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(EMBED_BATCH_SIZE) {
        let refs: Vec<&str> = chunk.iter().map(String::as_str).collect();
        embeddings.extend(model.embed(&refs).await?);
        progress(embeddings.len());
    }
    Ok(embeddings)
}

/// Build the configured embedding backend.
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingModel>, AiError> {
    match config.backend {
        EmbeddingBackend::OpenAi => Ok(Arc::new(OpenAiEmbeddings::new(config.clone())?)),
        #[cfg(feature = "onnx")]
        EmbeddingBackend::Onnx => Ok(Arc::new(OnnxEmbeddings::load(&config.model_dir)?)),
        #[cfg(not(feature = "onnx"))]
        EmbeddingBackend::Onnx => Err(AiError::Other(
            "ONNX embeddings need the `onnx` feature".into(),
        )),
    }
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// The API may return entries out of order; `index` is authoritative.
fn ordered_embeddings(
    response: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, AiError> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(AiError::Embedding(format!(
            "asked for {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl OpenAiEmbeddings {
    pub fn new(config: EmbeddingConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddings {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        debug!(url = %url, count = texts.len(), "embedding request");

        let mut req = self
            .client
            .post(&url)
            .json(&json!({"model": self.config.model, "input": texts}));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: EmbeddingResponse = resp.json().await?;
        let vectors = ordered_embeddings(parsed, texts.len())?;
        info!(model = %self.config.model, count = vectors.len(), "embedded texts");
        Ok(vectors)
    }
}

/// [`crate::embedder::Embedder`] behind the async trait.
///
/// Inference is CPU-bound and needs `&mut`, so calls are serialised through a
/// mutex and run on the blocking pool.
#[cfg(feature = "onnx")]
pub struct OnnxEmbeddings {
    inner: Arc<std::sync::Mutex<crate::embedder::Embedder>>,
}

#[cfg(feature = "onnx")]
impl OnnxEmbeddings {
    pub fn load(model_dir: &std::path::Path) -> Result<Self, AiError> {
        let embedder = crate::embedder::Embedder::load(model_dir)?;
        info!(dim = embedder.dim(), dir = %model_dir.display(), "loaded ONNX embedder");
        Ok(Self {
            inner: Arc::new(std::sync::Mutex::new(embedder)),
        })
    }
}

#[cfg(feature = "onnx")]
#[async_trait]
impl EmbeddingModel for OnnxEmbeddings {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
            let mut embedder = inner
                .lock()
                .map_err(|_| AiError::Embedding("embedder lock poisoned".into()))?;
            embedder.embed_batch(&refs)
        })
        .await
        .map_err(|e| AiError::Embedding(format!("embedding task failed: {e}")))?
    }
}

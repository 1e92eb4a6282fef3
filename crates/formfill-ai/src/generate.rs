//! Text-generation backends.
//!
//! Every pipeline talks to a [`Generator`]; which hosted API sits behind it
//! is decided by [`GenerationConfig`], built once and passed in. Two HTTP
//! backends are provided:
//!
//! - [`OpenAiChat`]: OpenAI-compatible `/chat/completions`
//! - [`ReplicateClient`]: Replicate predictions with a Llama 3 prompt template

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use formfill_core::{BackendKind, GenerationConfig};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::AiError;

/// One generation call. Unset sampling parameters fall back to the
/// backend's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            ..Self::default()
        }
    }

    pub fn system(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Generated text plus what the backend reported about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, AiError>;

    /// Model identifier, for logs and reports.
    fn model(&self) -> &str;
}

/// Build the configured backend.
pub fn from_config(config: &GenerationConfig) -> Result<Arc<dyn Generator>, AiError> {
    let generator: Arc<dyn Generator> = match config.backend {
        BackendKind::OpenAi => Arc::new(OpenAiChat::new(config.clone())?),
        BackendKind::Replicate => Arc::new(ReplicateClient::new(config.clone())?),
    };
    info!(backend = ?config.backend, model = %config.model, "configured generation backend");
    Ok(generator)
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, AiError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(AiError::Server {
        status: status.as_u16(),
        body,
    })
}

// ── OpenAI-compatible chat ──

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChat {
    client: reqwest::Client,
    config: GenerationConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

impl OpenAiChat {
    pub fn new(config: GenerationConfig) -> Result<Self, AiError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config,
        })
    }

    fn body(&self, request: &GenerateRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.user_prompt}));
        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "n": 1,
        })
    }
}

#[async_trait]
impl Generator for OpenAiChat {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, AiError> {
        let url = format!("{}/chat/completions", self.config.endpoint());
        debug!(url = %url, model = %self.config.model, "chat completion request");

        let mut req = self.client.post(&url).json(&self.body(request));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = check_status(req.send().await?).await?;
        let parsed: ChatResponse = resp.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(AiError::EmptyResponse)?;
        let tokens_used = parsed.usage.map(|u| u.total_tokens);
        info!(model = %self.config.model, tokens = ?tokens_used, "chat completion done");
        Ok(Generation {
            text,
            model: self.config.model.clone(),
            tokens_used,
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ── Replicate ──

/// Llama 3 instruct chat template understood by Replicate's Llama models.
pub const LLAMA3_PROMPT_TEMPLATE: &str = "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n\
{system_prompt}<|eot_id|><|start_header_id|>user<|end_header_id|>\n\n\
{prompt}<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n";

const LLAMA3_STOP_SEQUENCES: &str = "<|end_of_text|>,<|eot_id|>";

/// Interval between polls while a prediction is still running.
const POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Client for Replicate's official-model predictions endpoint.
pub struct ReplicateClient {
    client: reqwest::Client,
    config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
    urls: Option<PredictionUrls>,
    metrics: Option<PredictionMetrics>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: String,
}

#[derive(Debug, Deserialize)]
struct PredictionMetrics {
    output_token_count: Option<u32>,
    input_token_count: Option<u32>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    /// Streamed models return a list of text chunks; others a single string.
    fn output_text(&self) -> String {
        match &self.output {
            Value::String(s) => s.clone(),
            Value::Array(chunks) => chunks
                .iter()
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => String::new(),
        }
    }

    fn tokens_used(&self) -> Option<u32> {
        let m = self.metrics.as_ref()?;
        match (m.input_token_count, m.output_token_count) {
            (None, None) => None,
            (i, o) => Some(i.unwrap_or(0) + o.unwrap_or(0)),
        }
    }
}

impl ReplicateClient {
    pub fn new(config: GenerationConfig) -> Result<Self, AiError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config,
        })
    }

    fn body(&self, request: &GenerateRequest) -> Value {
        json!({
            "input": {
                "prompt": request.user_prompt,
                "system_prompt": request.system_prompt.as_deref().unwrap_or(""),
                "temperature": request.temperature.unwrap_or(self.config.temperature),
                "max_new_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
                "length_penalty": 1,
                "presence_penalty": 0,
                "stop_sequences": LLAMA3_STOP_SEQUENCES,
                "prompt_template": LLAMA3_PROMPT_TEMPLATE,
            }
        })
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, AiError> {
        let key = self
            .config
            .api_key
            .as_ref()
            .ok_or(AiError::MissingApiKey("replicate"))?;
        Ok(req.bearer_auth(key))
    }

    async fn poll(&self, mut prediction: Prediction) -> Result<Prediction, AiError> {
        while !prediction.is_terminal() {
            let url = prediction
                .urls
                .as_ref()
                .map(|u| u.get.clone())
                .ok_or_else(|| AiError::Other("prediction has no polling URL".into()))?;
            tokio::time::sleep(POLL_INTERVAL).await;
            debug!(id = %prediction.id, status = %prediction.status, "polling prediction");
            let resp = self.authorized(self.client.get(&url))?.send().await?;
            prediction = check_status(resp).await?.json().await?;
        }
        Ok(prediction)
    }
}

#[async_trait]
impl Generator for ReplicateClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, AiError> {
        let url = format!(
            "{}/models/{}/predictions",
            self.config.endpoint(),
            self.config.model
        );
        debug!(url = %url, "creating prediction");
        let resp = self
            .authorized(self.client.post(&url))?
            .header("Prefer", "wait")
            .json(&self.body(request))
            .send()
            .await?;
        let created: Prediction = check_status(resp).await?.json().await?;
        let prediction = self.poll(created).await?;

        if prediction.status != "succeeded" {
            return Err(AiError::Prediction {
                id: prediction.id,
                status: prediction.status,
                detail: prediction.error.to_string(),
            });
        }
        let text = prediction.output_text();
        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        let tokens_used = prediction.tokens_used();
        info!(
            model = %self.config.model,
            id = %prediction.id,
            tokens = ?tokens_used,
            "prediction done"
        );
        Ok(Generation {
            text,
            model: self.config.model.clone(),
            tokens_used,
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

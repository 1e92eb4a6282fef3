//! Runtime configuration, passed explicitly to every pipeline.
//!
//! All sections have defaults, so an empty `{}` config file (or no file at
//! all) is valid. API keys may appear in the file but are never serialized
//! back out; the binary normally takes them from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    /// Backend answering form-completion queries.
    pub completion: GenerationConfig,
    /// Backend regenerating fields from user feedback.
    pub feedback: GenerationConfig,
    /// Backend producing synthetic records and rephrased summaries.
    pub synthetic: GenerationConfig,
}

impl Config {
    /// Load a JSON config file; missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: GenerationConfig::default(),
            feedback: GenerationConfig::default(),
            synthetic: GenerationConfig::openai("gpt-4o"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of similar documents placed in the prompt context.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible `/chat/completions`.
    OpenAi,
    /// Replicate predictions API.
    Replicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: BackendKind,
    /// API root; defaults to the public endpoint of `backend`.
    pub base_url: Option<String>,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Replicate,
            base_url: None,
            model: "meta/meta-llama-3-8b-instruct".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 2500,
            timeout_secs: 120,
        }
    }
}

impl GenerationConfig {
    pub fn openai(model: &str) -> Self {
        Self {
            backend: BackendKind::OpenAi,
            model: model.to_string(),
            ..Self::default()
        }
    }

    /// API root without trailing slash.
    pub fn endpoint(&self) -> &str {
        let url = match (&self.base_url, self.backend) {
            (Some(url), _) => url.as_str(),
            (None, BackendKind::OpenAi) => "https://api.openai.com/v1",
            (None, BackendKind::Replicate) => "https://api.replicate.com/v1",
        };
        url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings`.
    OpenAi,
    /// Local sentence-transformers model through ONNX Runtime.
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Directory with `model.onnx` and `tokenizer.json` for the ONNX backend.
    pub model_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            api_key: None,
            model_dir: PathBuf::from("models/all-MiniLM-L6-v2"),
            timeout_secs: 60,
        }
    }
}

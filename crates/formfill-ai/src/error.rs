use formfill_core::{FormError, LiteralError, ParseError, RecordError};
use formfill_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("backend returned an empty response")]
    EmptyResponse,

    #[error("prediction {id} ended with status `{status}`: {detail}")]
    Prediction {
        id: String,
        status: String,
        detail: String,
    },

    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("no documents to index")]
    EmptyCorpus,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("malformed form response: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid form: {0}")]
    Form(#[from] FormError),

    #[error("invalid literal in response: {0}")]
    Literal(#[from] LiteralError),

    #[error("invalid record: {0}")]
    Record(#[from] RecordError),

    #[error("retrieval failed: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

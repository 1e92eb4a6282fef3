//! AI layer: embeddings, hosted LLM backends, and the pipelines built on them.
//!
//! - [`engine::QueryEngine`]: retrieval-augmented querying over documents
//! - [`pipeline`]: form completion and feedback regeneration
//! - [`eval`]: synthetic records, rephrased summaries and scoring

mod error;

pub mod embedding;
pub mod engine;
pub mod eval;
pub mod generate;
pub mod metrics;
pub mod pipeline;
pub mod prompts;

#[cfg(feature = "onnx")]
mod embedder;

#[cfg(test)]
mod testing;

pub use embedding::EmbeddingModel;
pub use engine::{QueryEngine, Response};
pub use error::AiError;
pub use generate::{GenerateRequest, Generation, Generator};
pub use pipeline::{Completion, complete_form, regenerate};
pub use prompts::CompletionStyle;

#[cfg(feature = "onnx")]
pub use embedder::Embedder;

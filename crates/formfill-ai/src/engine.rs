//! Retrieval-augmented query engine.
//!
//! A query is embedded, the `top_k` most similar documents are pulled from
//! the index, and their text is placed in the prompt as context for the
//! generation backend.

use std::sync::Arc;

use formfill_core::Document;
use formfill_store::{MemoryIndex, ScoredDocument, VectorIndex};
use tracing::{debug, info};

use crate::AiError;
use crate::embedding::{EmbeddingModel, embed_batched};
use crate::generate::{GenerateRequest, Generator};
use crate::prompts::qa_prompt;

pub const DEFAULT_TOP_K: usize = 5;

/// Answer text plus the documents that were shown to the backend.
#[derive(Debug, Clone)]
pub struct Response {
    pub text: String,
    pub sources: Vec<ScoredDocument>,
}

pub struct QueryEngine {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingModel>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    system_prompt: Option<String>,
}

impl QueryEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingModel>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            top_k: DEFAULT_TOP_K,
            system_prompt: None,
        }
    }

    /// Embed `documents` and serve them from an in-memory index. An empty
    /// corpus is an error.
    pub async fn build(
        documents: Vec<Document>,
        embedder: Arc<dyn EmbeddingModel>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, AiError> {
        if documents.is_empty() {
            return Err(AiError::EmptyCorpus);
        }
        let texts: Vec<String> = documents.iter().map(Document::text).collect();
        let embeddings = embed_batched(embedder.as_ref(), &texts, |done| {
            debug!(done, total = texts.len(), "embedded documents");
        })
        .await?;
        let index = MemoryIndex::from_embedded(documents, embeddings)?;
        info!(
            documents = index.len(),
            dim = index.dim(),
            "built in-memory index"
        );
        Ok(Self::new(Arc::new(index), embedder, generator))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// System prompt sent with [`QueryEngine::query`].
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingModel> {
        &self.embedder
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// The `top_k` documents most similar to `text`.
    pub async fn retrieve(&self, text: &str) -> Result<Vec<ScoredDocument>, AiError> {
        let query = self.embedder.embed_one(text).await?;
        let hits = self.index.search(&query, self.top_k).await?;
        debug!(hits = hits.len(), top_k = self.top_k, "retrieved documents");
        Ok(hits)
    }

    /// Retrieve with `search_text`, then ask `question` over the retrieved
    /// context.
    pub async fn answer(
        &self,
        system_prompt: Option<&str>,
        search_text: &str,
        question: &str,
    ) -> Result<Response, AiError> {
        let sources = self.retrieve(search_text).await?;
        let context = sources
            .iter()
            .map(|s| s.document.text())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut request = GenerateRequest::new(qa_prompt(&context, question));
        request.system_prompt = system_prompt.map(str::to_string);
        let generation = self.generator.generate(&request).await?;
        info!(
            model = %generation.model,
            sources = sources.len(),
            tokens = ?generation.tokens_used,
            "answered query"
        );
        Ok(Response {
            text: generation.text,
            sources,
        })
    }

    /// Retrieve with the prompt itself and answer it.
    pub async fn query(&self, prompt: &str) -> Result<Response, AiError> {
        self.answer(self.system_prompt.as_deref(), prompt, prompt)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGenerator, KeywordEmbedder};

    fn document(id: &str, department: &str, description: &str) -> Document {
        Document::from_values([
            "2K".into(),
            id.into(),
            "2024-07-19".into(),
            "John Doe".into(),
            department.into(),
            "High".into(),
            description.into(),
            String::new(),
        ])
    }

    fn embedder() -> Arc<KeywordEmbedder> {
        Arc::new(KeywordEmbedder::new(&["pump", "radar", "generator", "hull"]))
    }

    #[tokio::test]
    async fn empty_corpus_is_rejected() {
        let generator = Arc::new(FakeGenerator::new(["unused"]));
        let err = QueryEngine::build(Vec::new(), embedder(), generator.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AiError::EmptyCorpus));
        assert_eq!(err.to_string(), "no documents to index");
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn query_puts_nearest_documents_in_context() {
        let docs = vec![
            document("NAV-1", "Engineering", "Fire pump seal leaking"),
            document("NAV-2", "Electrical", "Radar display dead"),
            document("NAV-3", "Electrical", "Emergency generator will not start"),
        ];
        let generator = Arc::new(FakeGenerator::new(["answer"]));
        let engine = QueryEngine::build(docs, embedder(), generator.clone())
            .await
            .unwrap()
            .with_top_k(1)
            .with_system_prompt("be brief");

        let response = engine.query("the radar is broken").await.unwrap();
        assert_eq!(response.text, "answer");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].document.request_id(), "NAV-2");

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests[0].system_prompt.as_deref(), Some("be brief"));
        assert!(requests[0].user_prompt.contains("Description of Issue: Radar display dead"));
        assert!(!requests[0].user_prompt.contains("NAV-1"));
        assert!(requests[0].user_prompt.ends_with("Query: the radar is broken\nAnswer: "));
    }

    #[tokio::test]
    async fn default_top_k_is_five() {
        let docs: Vec<Document> = (0..7)
            .map(|i| document(&format!("NAV-{i}"), "Deck", "hull paint"))
            .collect();
        let generator = Arc::new(FakeGenerator::new(["ok"]));
        let engine = QueryEngine::build(docs, embedder(), generator).await.unwrap();
        assert_eq!(engine.top_k(), DEFAULT_TOP_K);
        let hits = engine.retrieve("hull").await.unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[tokio::test]
    async fn most_similar_first() {
        let docs = vec![
            document("NAV-1", "Engineering", "pump"),
            document("NAV-2", "Engineering", "pump pump generator"),
            document("NAV-3", "Electrical", "generator"),
        ];
        let generator = Arc::new(FakeGenerator::new(Vec::<String>::new()));
        let engine = QueryEngine::build(docs, embedder(), generator).await.unwrap();
        let hits = engine.retrieve("generator").await.unwrap();
        assert_eq!(hits[0].document.request_id(), "NAV-3");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

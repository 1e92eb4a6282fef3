//! In-process vector index with brute-force cosine search.

use async_trait::async_trait;
use formfill_core::Document;
use tracing::debug;

use crate::{ScoredDocument, StoreError, VectorIndex, normalize};

/// Documents and their unit-normalized embeddings, held in memory.
///
/// Search is a linear scan, which is plenty for a few thousand historical
/// requests. Ties keep insertion order.
pub struct MemoryIndex {
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    dim: usize,
}

impl MemoryIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            documents: Vec::new(),
            embeddings: Vec::new(),
            dim,
        }
    }

    /// Build an index from documents and their embeddings, in matching order.
    pub fn from_embedded(
        documents: Vec<Document>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, StoreError> {
        if documents.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                documents: documents.len(),
                embeddings: embeddings.len(),
            });
        }
        let dim = embeddings.first().map(Vec::len).unwrap_or(0);
        let mut index = Self::new(dim);
        for (doc, emb) in documents.into_iter().zip(embeddings) {
            index.insert(doc, emb)?;
        }
        Ok(index)
    }

    pub fn insert(
        &mut self,
        document: Document,
        mut embedding: Vec<f32>,
    ) -> Result<(), StoreError> {
        if embedding.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                got: embedding.len(),
            });
        }
        normalize(&mut embedding);
        self.documents.push(document);
        self.embeddings.push(embedding);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        if query.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }
        let mut q = query.to_vec();
        normalize(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, emb.iter().zip(&q).map(|(a, b)| a * b).sum()))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);

        debug!(candidates = self.len(), returned = scored.len(), "memory index search");
        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredDocument {
                document: self.documents[i].clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}

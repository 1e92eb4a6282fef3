//! LanceDB storage for embedded maintenance request documents.
//!
//! One table holds a row per historical request: the eight metadata columns,
//! the rendered `text`, and a `FixedSizeList<Float32, dim>` embedding used
//! for cosine similarity search.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListBuilder, Float32Array, Float32Builder, LargeStringArray, RecordBatch,
    RecordBatchIterator, StringArray,
};
use async_trait::async_trait;
use formfill_core::Document;
use formfill_core::record::DOCUMENT_FIELDS;
use formfill_core::schema::documents;
use futures::TryStreamExt;
use lancedb::DistanceType;
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::info;

use crate::{ScoredDocument, StoreError, VectorIndex};

pub const DOCUMENTS_TABLE: &str = "maintenance_requests";

/// LanceDB-backed [`VectorIndex`].
pub struct LanceIndex {
    db: lancedb::Connection,
    table: String,
}

impl LanceIndex {
    /// Connect to a LanceDB database at the given path.
    ///
    /// Creates the database directory if it doesn't exist.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let uri = path
            .to_str()
            .ok_or_else(|| StoreError::Other("non-UTF8 database path".into()))?;
        let db = lancedb::connect(uri).execute().await?;
        Ok(Self {
            db,
            table: DOCUMENTS_TABLE.to_string(),
        })
    }

    /// Create (or replace) the documents table.
    pub async fn write_documents(
        &self,
        docs: &[Document],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        if docs.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                documents: docs.len(),
                embeddings: embeddings.len(),
            });
        }
        if docs.is_empty() {
            return Err(StoreError::Other("no documents provided".into()));
        }

        let batch = documents_batch(docs, embeddings)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        // Drop existing table if it exists, then create fresh.
        let existing = self.db.table_names().execute().await?;
        if existing.contains(&self.table) {
            self.db.drop_table(&self.table, &[]).await?;
        }

        self.db
            .create_table(&self.table, Box::new(reader))
            .execute()
            .await?;

        info!(table = %self.table, rows = docs.len(), "created LanceDB documents table");
        Ok(())
    }

    /// List table names in the database.
    pub async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let names = self.db.table_names().execute().await?;
        Ok(names)
    }

    async fn open_table(&self) -> Result<lancedb::Table, StoreError> {
        let existing = self.db.table_names().execute().await?;
        if !existing.contains(&self.table) {
            return Err(StoreError::TableNotFound(self.table.clone()));
        }
        Ok(self.db.open_table(&self.table).execute().await?)
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let table = self.open_table().await?;
        let batches: Vec<RecordBatch> = table
            .vector_search(query)?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await?
            .try_collect()
            .await?;

        let mut results = Vec::with_capacity(limit);
        for batch in &batches {
            results.extend(scored_documents(batch)?);
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let table = self.open_table().await?;
        Ok(table.count_rows(None).await?)
    }
}

// ── Internal ──

fn documents_batch(docs: &[Document], embeddings: &[Vec<f32>]) -> Result<RecordBatch, StoreError> {
    let dim = embeddings[0].len();
    let schema = Arc::new(documents::documents_schema(dim as i32));

    let mut columns: Vec<Arc<dyn Array>> = Vec::with_capacity(DOCUMENT_FIELDS.len() + 2);
    for key in DOCUMENT_FIELDS {
        let values: Vec<&str> = docs.iter().map(|d| d.get(key).unwrap_or("")).collect();
        columns.push(Arc::new(StringArray::from(values)));
    }
    let texts: Vec<String> = docs.iter().map(Document::text).collect();
    columns.push(Arc::new(StringArray::from(texts)));

    let mut emb_builder = FixedSizeListBuilder::new(Float32Builder::new(), dim as i32);
    for emb in embeddings {
        if emb.len() != dim {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                got: emb.len(),
            });
        }
        emb_builder.values().append_slice(emb);
        emb_builder.append(true);
    }
    columns.push(Arc::new(emb_builder.finish()));

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Rebuild documents from a search result batch. Lance adds a `_distance`
/// column; with the cosine metric the similarity is `1 - distance`.
fn scored_documents(batch: &RecordBatch) -> Result<Vec<ScoredDocument>, StoreError> {
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| StoreError::Other("missing `_distance` column".into()))?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let mut values: [String; 8] = Default::default();
        for (slot, key) in values.iter_mut().zip(DOCUMENT_FIELDS) {
            let name = documents::column_name(key);
            let col = batch
                .column_by_name(&name)
                .ok_or_else(|| StoreError::Other(format!("missing `{name}` column")))?;
            *slot = get_string(col.as_ref(), row).unwrap_or_default();
        }
        out.push(ScoredDocument {
            document: Document::from_values(values),
            score: 1.0 - distances.value(row),
        });
    }
    Ok(out)
}

/// Handles both `Utf8` and `LargeUtf8` columns.
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        Some(arr.value(row).to_string())
    } else {
        col.as_any()
            .downcast_ref::<LargeStringArray>()
            .map(|arr| arr.value(row).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str, department: &str) -> Document {
        let mut values: [String; 8] = Default::default();
        values[0] = "2K".into();
        values[1] = id.into();
        values[4] = department.into();
        Document::from_values(values)
    }

    #[tokio::test]
    async fn open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let index = LanceIndex::open(&tmp.path().join("db")).await.unwrap();
        assert!(index.table_names().await.unwrap().is_empty());
        assert!(matches!(
            index.count().await,
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn write_and_search_documents() {
        let tmp = TempDir::new().unwrap();
        let index = LanceIndex::open(&tmp.path().join("db")).await.unwrap();
        index
            .write_documents(
                &[doc("NAV-1", "Engineering"), doc("NAV-2", "Electrical")],
                &[vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]],
            )
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        let results = index.search(&[0.1, 0.9, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.request_id(), "NAV-2");
        assert_eq!(results[0].document.department(), "Electrical");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn rewrite_replaces_table() {
        let tmp = TempDir::new().unwrap();
        let index = LanceIndex::open(&tmp.path().join("db")).await.unwrap();
        let docs = [doc("NAV-1", "Deck")];
        let embs = [vec![1.0, 0.0]];
        index.write_documents(&docs, &embs).await.unwrap();
        index.write_documents(&docs, &embs).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mismatched_lengths_error() {
        let tmp = TempDir::new().unwrap();
        let index = LanceIndex::open(&tmp.path().join("db")).await.unwrap();
        let result = index.write_documents(&[doc("NAV-1", "Deck")], &[]).await;
        assert!(matches!(result, Err(StoreError::LengthMismatch { .. })));
    }
}

//! Indexing pipeline: reads records, embeds their text, writes to LanceDB.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use formfill_ai::EmbeddingModel;
use formfill_ai::embedding::embed_batched;
use formfill_store::LanceIndex;

use crate::commands::load_documents;

pub struct IndexStats {
    pub total_rows: usize,
    pub elapsed_secs: f64,
}

/// Run the full indexing pipeline: read records → embed text → write to LanceDB.
pub async fn run_index_pipeline(
    lance: &LanceIndex,
    embedder: &dyn EmbeddingModel,
    records_path: &Path,
) -> anyhow::Result<IndexStats> {
    let start = Instant::now();

    let documents = load_documents(records_path)?;
    let total_rows = documents.len();
    eprintln!("  Read {total_rows} records from {}", records_path.display());

    if documents.is_empty() {
        return Ok(IndexStats {
            total_rows: 0,
            elapsed_secs: 0.0,
        });
    }

    let texts: Vec<String> = documents.iter().map(|d| d.text()).collect();
    let embeddings = embed_batched(embedder, &texts, |done| {
        eprint!(
            "\r  Embedded {done}/{total_rows} ({:.1}%)",
            done as f64 / total_rows as f64 * 100.0
        );
    })
    .await
    .context("generating embeddings")?;
    eprintln!();

    eprintln!("  Writing to LanceDB...");
    lance
        .write_documents(&documents, &embeddings)
        .await
        .context("writing documents table to LanceDB")?;

    Ok(IndexStats {
        total_rows,
        elapsed_secs: start.elapsed().as_secs_f64(),
    })
}

//! Historical maintenance requests and the retrieval documents built from them.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

/// A historical maintenance request as loaded from JSON.
pub type Record = Map<String, Value>;

/// Record keys copied into each [`Document`], in order.
pub const DOCUMENT_FIELDS: [&str; 8] = [
    "Form Type",
    "Request ID",
    "Date",
    "Requested By",
    "Department",
    "Priority",
    "Description of Issue",
    "Additional Notes",
];

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record {index}: missing key `{key}`")]
    MissingKey { index: usize, key: &'static str },

    #[error("record {index}: expected a JSON object")]
    NotAnObject { index: usize },

    #[error("records file must hold a JSON array")]
    NotAnArray,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An immutable retrieval document: the eight metadata fields of one
/// historical request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    metadata: [(&'static str, String); 8],
}

impl Document {
    /// Build a document from one record. Every key in [`DOCUMENT_FIELDS`]
    /// must be present; string values are copied verbatim, other JSON
    /// values as their JSON text.
    pub fn from_record(index: usize, record: &Record) -> Result<Self, RecordError> {
        let mut metadata: [(&'static str, String); 8] = Default::default();
        for (slot, key) in metadata.iter_mut().zip(DOCUMENT_FIELDS) {
            let value = record
                .get(key)
                .ok_or(RecordError::MissingKey { index, key })?;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            *slot = (key, text);
        }
        Ok(Self { metadata })
    }

    /// Rebuild a document from values stored in [`DOCUMENT_FIELDS`] order.
    pub fn from_values(values: [String; 8]) -> Self {
        let mut metadata: [(&'static str, String); 8] = Default::default();
        for ((slot, key), value) in metadata.iter_mut().zip(DOCUMENT_FIELDS).zip(values) {
            *slot = (key, value);
        }
        Self { metadata }
    }

    /// Metadata value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn metadata(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.metadata.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn request_id(&self) -> &str {
        &self.metadata[1].1
    }

    pub fn department(&self) -> &str {
        &self.metadata[4].1
    }

    pub fn priority(&self) -> &str {
        &self.metadata[5].1
    }

    pub fn description(&self) -> &str {
        &self.metadata[6].1
    }

    /// `Key: value` lines; this is the text that gets embedded and shown to
    /// the backend as retrieval context.
    pub fn text(&self) -> String {
        self.metadata
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build one document per record, failing on the first incomplete record.
pub fn build_documents(records: &[Record]) -> Result<Vec<Document>, RecordError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| Document::from_record(i, r))
        .collect()
}

/// Load records from a file holding a JSON array of objects.
pub fn load_records(path: &Path) -> Result<Vec<Record>, RecordError> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    let Value::Array(items) = value else {
        return Err(RecordError::NotAnArray);
    };
    let records = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(RecordError::NotAnObject { index }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    info!(count = records.len(), path = %path.display(), "loaded maintenance records");
    Ok(records)
}

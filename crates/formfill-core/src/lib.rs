pub mod config;
pub mod form;
pub mod literal;
pub mod protocol;
pub mod record;
pub mod schema;

pub use config::{
    BackendKind, Config, ConfigError, EmbeddingBackend, EmbeddingConfig, GenerationConfig,
    RetrievalConfig,
};
pub use form::{Field, FieldValue, Form, FormError, RegenerationRequest};
pub use literal::{Literal, LiteralError, parse_literal};
pub use protocol::{
    FieldMap, ParseError, REGENERATE_KEY, parse_fields, render_form, render_regeneration_input,
};
pub use record::{DOCUMENT_FIELDS, Document, Record, RecordError, build_documents, load_records};

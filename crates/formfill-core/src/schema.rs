/// Arrow schema for the maintenance request documents table.
pub mod documents {
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    use crate::record::DOCUMENT_FIELDS;

    /// Column holding the rendered document text.
    pub const TEXT_COLUMN: &str = "text";
    /// Column holding the document embedding.
    pub const EMBEDDING_COLUMN: &str = "embedding";

    /// Column name for a document metadata key (`"Request ID"` → `"request_id"`).
    pub fn column_name(key: &str) -> String {
        key.to_ascii_lowercase().replace(' ', "_")
    }

    /// One non-null Utf8 column per metadata key, then `text` and a
    /// `FixedSizeList<Float32, dim>` embedding.
    pub fn documents_schema(dim: i32) -> Schema {
        let mut fields: Vec<Field> = DOCUMENT_FIELDS
            .iter()
            .map(|key| Field::new(column_name(key), DataType::Utf8, false))
            .collect();
        fields.push(Field::new(TEXT_COLUMN, DataType::Utf8, false));
        fields.push(Field::new(
            EMBEDDING_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ));
        Schema::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::documents;

    #[test]
    fn documents_schema_has_expected_fields() {
        let schema = documents::documents_schema(384);
        assert_eq!(schema.fields().len(), 10);
        assert!(schema.field_with_name("request_id").is_ok());
        assert!(schema.field_with_name("description_of_issue").is_ok());
        assert!(schema.field_with_name("embedding").is_ok());
    }

    #[test]
    fn column_names_are_snake_case() {
        assert_eq!(documents::column_name("Additional Notes"), "additional_notes");
        assert_eq!(documents::column_name("Form Type"), "form_type");
    }
}

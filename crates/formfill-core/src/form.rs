//! Maintenance request forms and partial regeneration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::literal::Literal;
use crate::protocol::FieldMap;

/// Number of long-form alternatives expected for a regenerated description.
pub const DESCRIPTION_VARIANTS: usize = 3;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("missing required field `{0}`")]
    MissingField(Field),

    #[error("field `{field}` must be a string or a list of strings, got {found}")]
    InvalidValue { field: Field, found: &'static str },

    #[error("unknown field name `{0}`")]
    UnknownField(String),

    #[error("regenerated `Description of Issue` must be a list of 3 distinct strings, got {0}")]
    DescriptionVariants(String),
}

/// The five canonical form fields, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Department,
    Priority,
    DescriptionOfIssue,
    RequestedActions,
    AdditionalNotes,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Department,
        Field::Priority,
        Field::DescriptionOfIssue,
        Field::RequestedActions,
        Field::AdditionalNotes,
    ];

    /// Name as it appears on the wire and in JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Department => "Department",
            Self::Priority => "Priority",
            Self::DescriptionOfIssue => "Description of Issue",
            Self::RequestedActions => "Requested Actions",
            Self::AdditionalNotes => "Additional Notes",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts the canonical name in any case, or a snake/kebab-case form
/// (`description-of-issue`, `additional_notes`).
impl FromStr for Field {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect::<String>()
            .to_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.name().to_lowercase() == wanted)
            .ok_or_else(|| FormError::UnknownField(s.to_string()))
    }
}

/// A field's value: one string, or an ordered list of strings.
///
/// Lists are either candidates ranked by descending likelihood
/// (Department, Priority) or generated alternatives (Description of Issue,
/// Requested Actions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn from_literal(field: Field, literal: &Literal) -> Result<Self, FormError> {
        if let Some(s) = literal.as_str() {
            return Ok(Self::Text(s.to_string()));
        }
        let invalid = || FormError::InvalidValue {
            field,
            found: literal.kind(),
        };
        let items = literal.as_seq().ok_or_else(invalid)?;
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Self::List)
            .ok_or_else(invalid)
    }

    pub fn to_literal(&self) -> Literal {
        match self {
            Self::Text(s) => Literal::Str(s.clone()),
            Self::List(items) => Literal::List(items.iter().cloned().map(Literal::Str).collect()),
        }
    }

    /// The single text, or the first (most likely) list entry.
    pub fn primary(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::List(items) => items.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All entries; a single text is a one-element slice.
    pub fn options(&self) -> &[String] {
        match self {
            Self::Text(s) => std::slice::from_ref(s),
            Self::List(items) => items,
        }
    }
}

/// A completed maintenance request form. All five fields are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    #[serde(rename = "Department")]
    pub department: FieldValue,
    #[serde(rename = "Priority")]
    pub priority: FieldValue,
    #[serde(rename = "Description of Issue")]
    pub description_of_issue: FieldValue,
    #[serde(rename = "Requested Actions")]
    pub requested_actions: FieldValue,
    #[serde(rename = "Additional Notes")]
    pub additional_notes: FieldValue,
}

impl Form {
    /// Build a form from a parsed field mapping, failing on the first
    /// canonical field that is absent. Extra keys are ignored.
    pub fn from_fields(fields: &FieldMap) -> Result<Self, FormError> {
        let take = |field: Field| -> Result<FieldValue, FormError> {
            let literal = fields
                .get(field.name())
                .ok_or(FormError::MissingField(field))?;
            FieldValue::from_literal(field, literal)
        };
        Ok(Self {
            department: take(Field::Department)?,
            priority: take(Field::Priority)?,
            description_of_issue: take(Field::DescriptionOfIssue)?,
            requested_actions: take(Field::RequestedActions)?,
            additional_notes: take(Field::AdditionalNotes)?,
        })
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        match field {
            Field::Department => &self.department,
            Field::Priority => &self.priority,
            Field::DescriptionOfIssue => &self.description_of_issue,
            Field::RequestedActions => &self.requested_actions,
            Field::AdditionalNotes => &self.additional_notes,
        }
    }

    pub fn set(&mut self, field: Field, value: FieldValue) {
        let slot = match field {
            Field::Department => &mut self.department,
            Field::Priority => &mut self.priority,
            Field::DescriptionOfIssue => &mut self.description_of_issue,
            Field::RequestedActions => &mut self.requested_actions,
            Field::AdditionalNotes => &mut self.additional_notes,
        };
        *slot = value;
    }

    /// Apply a regeneration result.
    ///
    /// Only the fields named in `request` are taken from `regenerated`; every
    /// other field is copied from `self` unchanged, whatever the backend
    /// echoed for it. A requested field missing from `regenerated` is an
    /// error, and a regenerated description must hold exactly
    /// [`DESCRIPTION_VARIANTS`] distinct alternatives.
    pub fn overlay(
        &self,
        regenerated: &FieldMap,
        request: &RegenerationRequest,
    ) -> Result<Form, FormError> {
        let mut merged = self.clone();
        for field in request.fields() {
            let literal = regenerated
                .get(field.name())
                .ok_or(FormError::MissingField(field))?;
            let value = FieldValue::from_literal(field, literal)?;
            if field == Field::DescriptionOfIssue {
                check_variants(&value)?;
            }
            merged.set(field, value);
        }
        Ok(merged)
    }
}

fn check_variants(value: &FieldValue) -> Result<(), FormError> {
    let FieldValue::List(items) = value else {
        return Err(FormError::DescriptionVariants("a single string".into()));
    };
    if items.len() != DESCRIPTION_VARIANTS {
        return Err(FormError::DescriptionVariants(format!(
            "{} entries",
            items.len()
        )));
    }
    for (i, item) in items.iter().enumerate() {
        if items[..i].contains(item) {
            return Err(FormError::DescriptionVariants(format!(
                "a duplicate at position {i}"
            )));
        }
    }
    Ok(())
}

/// Fields to regenerate, each with the user's feedback text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegenerationRequest {
    feedback: BTreeMap<Field, String>,
}

impl RegenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: Field, feedback: impl Into<String>) -> Self {
        self.insert(field, feedback);
        self
    }

    /// Add or replace the feedback for `field`.
    pub fn insert(&mut self, field: Field, feedback: impl Into<String>) {
        self.feedback.insert(field, feedback.into());
    }

    pub fn is_empty(&self) -> bool {
        self.feedback.is_empty()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.feedback.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.feedback.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.feedback.iter().map(|(f, s)| (*f, s.as_str()))
    }

    /// The request as a dict literal, keyed by field name.
    pub fn to_literal(&self) -> Literal {
        Literal::Dict(
            self.iter()
                .map(|(f, s)| (Literal::Str(f.name().into()), Literal::Str(s.into())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.into())
    }

    fn list(items: &[&str]) -> FieldValue {
        FieldValue::List(items.iter().map(|s| s.to_string()).collect())
    }

    fn sample_form() -> Form {
        Form {
            department: list(&["Engineering", "Mechanical", "Electrical"]),
            priority: list(&["Medium", "Low", "High"]),
            description_of_issue: list(&[
                "Leaks detected in the HVAC system.",
                "The HVAC system is leaking.",
                "HVAC leaks require inspection.",
            ]),
            requested_actions: list(&["Inspect the HVAC system for leaks"]),
            additional_notes: text("Review previous maintenance records."),
        }
    }

    fn map(entries: &[(&str, Literal)]) -> FieldMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn field_names_parse_loosely() {
        assert_eq!("Department".parse::<Field>().unwrap(), Field::Department);
        assert_eq!(
            "description-of-issue".parse::<Field>().unwrap(),
            Field::DescriptionOfIssue
        );
        assert_eq!(
            "ADDITIONAL_NOTES".parse::<Field>().unwrap(),
            Field::AdditionalNotes
        );
        assert!(matches!(
            "Budget".parse::<Field>(),
            Err(FormError::UnknownField(_))
        ));
    }

    #[test]
    fn from_fields_reports_missing_field() {
        let fields = map(&[
            ("Department", Literal::Str("Engineering".into())),
            ("Priority", Literal::Str("High".into())),
        ]);
        let err = Form::from_fields(&fields).unwrap_err();
        assert!(matches!(
            err,
            FormError::MissingField(Field::DescriptionOfIssue)
        ));
    }

    #[test]
    fn from_fields_rejects_non_string_values() {
        let mut fields = map(&[]);
        for field in Field::ALL {
            fields.insert(field.name().into(), Literal::Str("x".into()));
        }
        fields.insert("Priority".into(), Literal::Int(1));
        let err = Form::from_fields(&fields).unwrap_err();
        assert!(matches!(
            err,
            FormError::InvalidValue {
                field: Field::Priority,
                found: "int"
            }
        ));
    }

    #[test]
    fn primary_is_first_candidate() {
        let form = sample_form();
        assert_eq!(form.department.primary(), "Engineering");
        assert_eq!(form.additional_notes.primary(), "Review previous maintenance records.");
        assert_eq!(FieldValue::List(vec![]).primary(), "");
        assert_eq!(form.additional_notes.options().len(), 1);
    }

    #[test]
    fn overlay_notes_only_keeps_other_fields() {
        let original = sample_form();
        let request = RegenerationRequest::new()
            .with(Field::AdditionalNotes, "Mention the Type X-200 radiator");

        // The backend rewrote everything, but only the notes may change.
        let regenerated = map(&[
            ("Department", Literal::Str("Supply".into())),
            ("Priority", Literal::Str("Low".into())),
            ("Description of Issue", Literal::Str("Something else".into())),
            ("Requested Actions", Literal::List(vec![])),
            (
                "Additional Notes",
                Literal::Str("A Type X-200 radiator replacement is required.".into()),
            ),
        ]);

        let merged = original.overlay(&regenerated, &request).unwrap();
        for field in [
            Field::Department,
            Field::Priority,
            Field::DescriptionOfIssue,
            Field::RequestedActions,
        ] {
            assert_eq!(merged.get(field), original.get(field), "{field} changed");
        }
        assert_eq!(
            merged.additional_notes,
            text("A Type X-200 radiator replacement is required.")
        );
    }

    #[test]
    fn overlay_requires_requested_field() {
        let request = RegenerationRequest::new().with(Field::Priority, "make it urgent");
        let err = sample_form().overlay(&map(&[]), &request).unwrap_err();
        assert!(matches!(err, FormError::MissingField(Field::Priority)));
    }

    #[test]
    fn overlay_checks_description_variants() {
        let request =
            RegenerationRequest::new().with(Field::DescriptionOfIssue, "broken radiator");
        let strs = |items: &[&str]| {
            Literal::List(items.iter().map(|s| Literal::Str(s.to_string())).collect())
        };

        let two = map(&[("Description of Issue", strs(&["a", "b"]))]);
        assert!(matches!(
            sample_form().overlay(&two, &request),
            Err(FormError::DescriptionVariants(_))
        ));

        let duplicate = map(&[("Description of Issue", strs(&["a", "b", "a"]))]);
        assert!(matches!(
            sample_form().overlay(&duplicate, &request),
            Err(FormError::DescriptionVariants(_))
        ));

        let single = map(&[("Description of Issue", Literal::Str("a".into()))]);
        assert!(matches!(
            sample_form().overlay(&single, &request),
            Err(FormError::DescriptionVariants(_))
        ));

        let ok = map(&[("Description of Issue", strs(&["a", "b", "c"]))]);
        let merged = sample_form().overlay(&ok, &request).unwrap();
        assert_eq!(merged.description_of_issue, list(&["a", "b", "c"]));
    }

    #[test]
    fn form_json_uses_wire_names() {
        let json = serde_json::to_value(sample_form()).unwrap();
        assert_eq!(json["Priority"][0], "Medium");
        assert_eq!(json["Additional Notes"], "Review previous maintenance records.");

        let back: Form = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_form());
    }

    #[test]
    fn request_renders_as_dict_literal() {
        let request = RegenerationRequest::new()
            .with(Field::AdditionalNotes, "radiator type")
            .with(Field::DescriptionOfIssue, "broken radiator");
        assert_eq!(
            request.to_literal().to_string(),
            r#"{"Description of Issue": "broken radiator", "Additional Notes": "radiator type"}"#
        );
    }
}

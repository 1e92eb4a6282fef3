//! Line-oriented `Field: value` wire format between the pipelines and the
//! generation backend.
//!
//! A form travels as five lines, one per field, each value written as a
//! literal (see [`crate::literal`]):
//!
//! ```text
//! Department: ["Engineering", "Mechanical", "Electrical"]
//! Priority: ["High", "Medium", "Low"]
//! Description of Issue: "The cooling system in the engine room is malfunctioning."
//! Requested Actions: ["Inspect the cooling system", "Replace faulty components"]
//! Additional Notes: "Previous maintenance was done three months ago."
//! ```

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::form::{Field, Form, RegenerationRequest};
use crate::literal::{Literal, LiteralError, parse_literal};

/// Key/value separator on a form line.
pub const SEPARATOR: &str = ": ";

/// Extra key carrying the regeneration feedback in a regeneration prompt.
pub const REGENERATE_KEY: &str = "Fields to Regenerate";

/// Parsed `Field: value` lines, keyed by field name.
pub type FieldMap = BTreeMap<String, Literal>;

#[derive(Debug, Error)]
#[error("line {line}: cannot parse value of `{key}`: {source}")]
pub struct ParseError {
    /// 1-based line number in the response text.
    pub line: usize,
    pub key: String,
    #[source]
    pub source: LiteralError,
}

/// Parse a backend response into a field mapping.
///
/// Lines without `": "` are skipped. Key and value are split on the first
/// separator and trimmed; the value must be a valid literal or the whole
/// parse fails. A repeated key replaces the earlier value. The result may
/// hold any subset of the canonical fields; use [`Form::from_fields`] to
/// require all five.
pub fn parse_fields(text: &str) -> Result<FieldMap, ParseError> {
    let mut fields = FieldMap::new();
    for (i, line) in text.split('\n').enumerate() {
        let Some((key, value)) = line.split_once(SEPARATOR) else {
            continue;
        };
        let key = key.trim();
        let literal = parse_literal(value.trim()).map_err(|source| ParseError {
            line: i + 1,
            key: key.to_string(),
            source,
        })?;
        fields.insert(key.to_string(), literal);
    }
    debug!(keys = fields.len(), "parsed structured fields");
    Ok(fields)
}

/// Render a form as five `Field: value` lines in canonical order.
pub fn render_form(form: &Form) -> String {
    let mut out = String::new();
    for field in Field::ALL {
        push_line(&mut out, field.name(), &form.get(field).to_literal());
    }
    out
}

/// Render the regeneration input: the current form followed by a
/// `Fields to Regenerate` line holding the feedback dict.
pub fn render_regeneration_input(form: &Form, request: &RegenerationRequest) -> String {
    let mut out = render_form(form);
    push_line(&mut out, REGENERATE_KEY, &request.to_literal());
    out
}

fn push_line(out: &mut String, key: &str, value: &Literal) {
    out.push_str(key);
    out.push_str(SEPARATOR);
    out.push_str(&value.to_string());
    out.push('\n');
}

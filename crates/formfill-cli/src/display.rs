//! Vertical card display for completed forms.

use std::fmt::Write as _;

use formfill_core::{Field, FieldValue, Form};
use formfill_store::ScoredDocument;

const LABEL_WIDTH: usize = 22;
const MAX_SOURCES: usize = 5;
const MAX_SNIPPET: usize = 70;

/// Ranked fields show their first entry and the alternatives after it.
const RANKED: &[Field] = &[Field::Department, Field::Priority];

/// Render a form as a human-readable card, followed by the records it was
/// grounded on.
pub fn form_card(form: &Form, sources: &[ScoredDocument]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Maintenance Request ===");
    let _ = writeln!(out);

    for &field in RANKED {
        write_ranked(&mut out, field.name(), form.get(field));
    }
    let _ = writeln!(out);

    write_numbered(&mut out, Field::DescriptionOfIssue.name(), &form.description_of_issue);
    write_numbered(&mut out, Field::RequestedActions.name(), &form.requested_actions);

    let notes = form.additional_notes.options().join(" ");
    if !notes.trim().is_empty() {
        let _ = writeln!(out, "{}", Field::AdditionalNotes.name());
        let _ = writeln!(out, "  {notes}");
        let _ = writeln!(out);
    }

    if !sources.is_empty() {
        let _ = writeln!(out, "Similar requests ({}):", sources.len());
        for hit in sources.iter().take(MAX_SOURCES) {
            let doc = &hit.document;
            let _ = writeln!(
                out,
                "  {:<12} {:.3}  {:<12} {:<8} {}",
                doc.request_id(),
                hit.score,
                doc.department(),
                doc.priority(),
                truncate(doc.description(), MAX_SNIPPET)
            );
        }
        if sources.len() > MAX_SOURCES {
            let _ = writeln!(out, "  ... and {} more", sources.len() - MAX_SOURCES);
        }
    }
    out
}

pub fn print_form_card(form: &Form, sources: &[ScoredDocument]) {
    print!("{}", form_card(form, sources));
}

fn write_ranked(out: &mut String, label: &str, value: &FieldValue) {
    let _ = write!(out, "{label:<LABEL_WIDTH$} {}", value.primary());
    if let FieldValue::List(items) = value
        && items.len() > 1
    {
        let _ = write!(out, "  (also: {})", items[1..].join(", "));
    }
    let _ = writeln!(out);
}

fn write_numbered(out: &mut String, label: &str, value: &FieldValue) {
    let items = value.options();
    if items.iter().all(|s| s.trim().is_empty()) {
        return;
    }
    let _ = writeln!(out, "{label}");
    if items.len() == 1 {
        let _ = writeln!(out, "  {}", items[0]);
    } else {
        for (i, item) in items.iter().enumerate() {
            let _ = writeln!(out, "  {}. {item}", i + 1);
        }
    }
    let _ = writeln!(out);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max - 3).collect();
    format!("{cut}...")
}

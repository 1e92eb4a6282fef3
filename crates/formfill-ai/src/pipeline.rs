//! Form completion and feedback regeneration.

use formfill_core::{Field, Form, RegenerationRequest, parse_fields};
use formfill_store::ScoredDocument;
use tracing::{info, warn};

use crate::AiError;
use crate::engine::QueryEngine;
use crate::generate::{GenerateRequest, Generator};
use crate::prompts::{
    CompletionStyle, FEEDBACK_SYSTEM_PROMPT, completion_prompt, feedback_prompt,
};

/// A completed form and the historical requests it was grounded on.
#[derive(Debug, Clone)]
pub struct Completion {
    pub form: Form,
    pub sources: Vec<ScoredDocument>,
}

/// Complete a form from a short problem summary.
///
/// Retrieval uses the summary alone; the backend sees the summary wrapped
/// in the completion template together with the retrieved context.
pub async fn complete_form(
    engine: &QueryEngine,
    summary: &str,
    style: CompletionStyle,
) -> Result<Completion, AiError> {
    let response = engine
        .answer(Some(style.system_prompt()), summary, &completion_prompt(summary))
        .await?;
    let fields = parse_fields(&response.text)?;
    let form = Form::from_fields(&fields)?;
    info!(
        department = %form.department.primary(),
        priority = %form.priority.primary(),
        sources = response.sources.len(),
        "completed form"
    );
    Ok(Completion {
        form,
        sources: response.sources,
    })
}

/// Regenerate the fields named in `request`, keeping every other field of
/// `form` as it is.
///
/// The backend is asked to echo unchanged fields, but only the requested
/// ones are read back from its answer.
pub async fn regenerate(
    generator: &dyn Generator,
    form: &Form,
    request: &RegenerationRequest,
) -> Result<Form, AiError> {
    if request.is_empty() {
        return Ok(form.clone());
    }
    let prompt =
        GenerateRequest::new(feedback_prompt(form, request)).system(FEEDBACK_SYSTEM_PROMPT);
    let generation = generator.generate(&prompt).await?;
    let fields = parse_fields(&generation.text)?;

    let echoed_changes = Form::from_fields(&fields)
        .map(|echoed| {
            Field::ALL
                .into_iter()
                .filter(|f| !request.contains(*f) && echoed.get(*f) != form.get(*f))
                .count()
        })
        .unwrap_or(0);
    if echoed_changes > 0 {
        warn!(
            fields = echoed_changes,
            "backend altered fields outside the request; ignoring them"
        );
    }

    let updated = form.overlay(&fields, request)?;
    info!(
        regenerated = ?request.fields().map(|f| f.name()).collect::<Vec<_>>(),
        "regenerated form fields"
    );
    Ok(updated)
}

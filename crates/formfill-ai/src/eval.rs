//! Synthetic data generation and the offline evaluation harness.
//!
//! The harness takes each reference document, has a backend rewrite its
//! description into a terse summary, runs the summary through form
//! completion, and scores the result against the reference:
//!
//! - Department and Priority: classification report
//! - Description: ROUGE and embedding cosine similarity
//!
//! Items run one after another and the first error aborts the run.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use formfill_core::{
    Document, FieldValue, Form, Literal, Record, build_documents, parse_literal,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::AiError;
use crate::engine::QueryEngine;
use crate::generate::{GenerateRequest, Generator};
use crate::metrics::{ClassificationReport, RougeScores};
use crate::pipeline::complete_form;
use crate::prompts::{
    CompletionStyle, DATA_GENERATION_SYSTEM_PROMPT, SUMMARY_AUGMENTATION_SYSTEM_PROMPT,
    SYNTHETIC_RECORDS_PROMPT, rephrase_prompt,
};

const RULE: &str = "-----------------------------------------";

/// Rewrite a full description into a short, reworded summary.
pub async fn rephrase_summary(
    generator: &dyn Generator,
    description: &str,
) -> Result<String, AiError> {
    let request = GenerateRequest::new(rephrase_prompt(description))
        .system(SUMMARY_AUGMENTATION_SYSTEM_PROMPT)
        .max_tokens(500)
        .temperature(0.9);
    let generation = generator.generate(&request).await?;
    Ok(generation.text.trim().to_string())
}

/// Ask the backend for a batch of new maintenance records.
///
/// The answer must be a list of dicts; every record must carry the eight
/// document keys.
pub async fn generate_synthetic_records(
    generator: &dyn Generator,
) -> Result<Vec<Record>, AiError> {
    let request = GenerateRequest::new(SYNTHETIC_RECORDS_PROMPT)
        .system(DATA_GENERATION_SYSTEM_PROMPT)
        .max_tokens(2500)
        .temperature(0.7);
    let generation = generator.generate(&request).await?;
    let records = parse_records(&generation.text)?;
    build_documents(&records)?;
    info!(
        count = records.len(),
        model = %generation.model,
        "generated synthetic records"
    );
    Ok(records)
}

fn parse_records(text: &str) -> Result<Vec<Record>, AiError> {
    let literal = parse_literal(strip_code_fence(text))?;
    let Literal::List(items) = literal else {
        return Err(AiError::Other(format!(
            "expected a list of records, got {}",
            literal.kind()
        )));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item.to_json() {
            Value::Object(map) => Ok(map),
            _ => Err(AiError::Other(format!(
                "record {i} is a {}, not a dict",
                item.kind()
            ))),
        })
        .collect()
}

/// Drop a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. `json`, `python`) on the opening line.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Write records as a pretty-printed JSON array.
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), AiError> {
    let array: Vec<Value> = records.iter().cloned().map(Value::Object).collect();
    std::fs::write(path, serde_json::to_string_pretty(&array)?)?;
    info!(count = records.len(), path = %path.display(), "wrote records");
    Ok(())
}

/// Most common Department and Priority across several completions of the
/// same summary, plus the first completion's description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consensus {
    pub department: String,
    pub priority: String,
    pub description: FieldValue,
}

/// `None` for an empty slice. Ties go to the value seen first.
pub fn consensus(forms: &[Form]) -> Option<Consensus> {
    let first = forms.first()?;
    Some(Consensus {
        department: most_common(forms.iter().map(|f| f.department.primary()))?,
        priority: most_common(forms.iter().map(|f| f.priority.primary()))?,
        description: first.description_of_issue.clone(),
    })
}

fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, value) in values.enumerate() {
        counts.entry(value).or_insert((0, order)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, oa)), (_, (cb, ob))| ca.cmp(cb).then(ob.cmp(oa)))
        .map(|(value, _)| value.to_string())
}

/// One scored reference document.
///
/// `predicted` is the first completion of the summary; scoring uses the
/// consensus over all `samples` completions.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationItem {
    pub request_id: String,
    pub summary: String,
    pub expected_department: String,
    pub expected_priority: String,
    pub expected_description: String,
    pub predicted: Form,
    pub samples: usize,
    pub consensus: Consensus,
    pub rouge: RougeScores,
    pub similarity: f32,
}

impl EvaluationItem {
    pub fn generated_description(&self) -> &str {
        self.consensus.description.primary()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub department: ClassificationReport,
    pub priority: ClassificationReport,
    pub items: Vec<EvaluationItem>,
}

/// Score form completion over `documents`.
///
/// `rephraser` writes the summaries; completion and similarity use the
/// engine's own backends. Each summary is completed `samples` times (at
/// least once) and scored on the [`consensus`] of those forms.
pub async fn evaluate(
    engine: &QueryEngine,
    rephraser: &dyn Generator,
    documents: &[Document],
    style: CompletionStyle,
    samples: usize,
) -> Result<Evaluation, AiError> {
    let samples = samples.max(1);
    let mut items = Vec::with_capacity(documents.len());
    for (i, doc) in documents.iter().enumerate() {
        let summary = rephrase_summary(rephraser, doc.description()).await?;
        let mut forms = Vec::with_capacity(samples);
        for _ in 0..samples {
            forms.push(complete_form(engine, &summary, style).await?.form);
        }
        let agreed = consensus(&forms)
            .ok_or_else(|| AiError::Other("no completions to score".into()))?;
        let generated = agreed.description.primary();

        let vectors = engine
            .embedder()
            .embed(&[generated, doc.description()])
            .await?;
        let similarity = match vectors.as_slice() {
            [a, b] => formfill_store::cosine_similarity(a, b),
            _ => return Err(AiError::Embedding("expected two embeddings".into())),
        };
        let rouge = RougeScores::compute(generated, doc.description());
        info!(
            item = i + 1,
            of = documents.len(),
            request = %doc.request_id(),
            rouge_l = rouge.rouge_l.fmeasure,
            similarity,
            "scored item"
        );
        items.push(EvaluationItem {
            request_id: doc.request_id().to_string(),
            summary,
            expected_department: doc.department().to_string(),
            expected_priority: doc.priority().to_string(),
            expected_description: doc.description().to_string(),
            predicted: forms.swap_remove(0),
            samples,
            consensus: agreed,
            rouge,
            similarity,
        });
    }

    let department = classification(&items, |it| {
        (&it.expected_department, it.consensus.department.as_str())
    });
    let priority = classification(&items, |it| {
        (&it.expected_priority, it.consensus.priority.as_str())
    });
    info!(
        items = items.len(),
        department_accuracy = department.accuracy,
        priority_accuracy = priority.accuracy,
        "evaluation finished"
    );
    Ok(Evaluation {
        department,
        priority,
        items,
    })
}

fn classification(
    items: &[EvaluationItem],
    pick: impl Fn(&EvaluationItem) -> (&String, &str),
) -> ClassificationReport {
    let (expected, predicted): (Vec<&str>, Vec<&str>) = items
        .iter()
        .map(|it| {
            let (e, p) = pick(it);
            (e.as_str(), p)
        })
        .unzip();
    ClassificationReport::new(&expected, &predicted)
}

impl Evaluation {
    pub fn forms(&self) -> Vec<&Form> {
        self.items.iter().map(|it| &it.predicted).collect()
    }

    /// Human-readable results: both classification reports, then one block
    /// per item.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "Department Scores:\n{RULE}\n{}\n\n\n{RULE}\n\nPriority Scores:\n{RULE}\n{}\n\n",
            self.department, self.priority
        );
        for item in &self.items {
            if item.samples > 1 {
                let _ = write!(
                    out,
                    "Consensus over {} samples: {} / {}\n\n",
                    item.samples, item.consensus.department, item.consensus.priority
                );
            }
            let _ = write!(
                out,
                "Generated Summary: {}\n\n\
                 Generated Description: {}\n\n\
                 Actual Description: {}\n\n\
                 ROUGE-1: {}\n\
                 ROUGE-2: {}\n\
                 ROUGE-L: {}\n\
                 Embedding Similarity: {:.4}\n\n\
                 {RULE}\n\n",
                item.summary,
                item.generated_description(),
                item.expected_description,
                item.rouge.rouge1,
                item.rouge.rouge2,
                item.rouge.rouge_l,
                item.similarity,
            );
        }
        out
    }

    pub fn write_report(&self, path: &Path) -> Result<(), AiError> {
        std::fs::write(path, self.render_report())?;
        info!(path = %path.display(), "wrote evaluation report");
        Ok(())
    }

    /// The completed forms as a pretty-printed JSON array.
    pub fn write_forms(&self, path: &Path) -> Result<(), AiError> {
        std::fs::write(path, serde_json::to_string_pretty(&self.forms())?)?;
        info!(path = %path.display(), forms = self.items.len(), "wrote generated forms");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{FakeGenerator, KeywordEmbedder};
    use formfill_core::{DOCUMENT_FIELDS, parse_fields};

    const SYNTHETIC: &str = r#"```python
[{
    "Form Type": "2K",
    "Request ID": "NAV-20001",
    "Date": "2024-07-21",
    "Requested By": "Alex Kim",
    "Department": "Electrical",
    "Priority": "Low",
    "Description of Issue": "Lighting circuit 2-45-1 in aft passageway tripping intermittently.",
    "Additional Notes": "No impact on watchstanding.",
},
{
    'Form Type': '2K',
    'Request ID': 'NAV-20002',
    'Date': '2024-07-22',
    'Requested By': 'Sam Lee',
    'Department': 'Deck',
    'Priority': 'Medium',
    'Description of Issue': 'Anchor windlass brake band worn beyond limits.',
    'Additional Notes': 'Needs IMA assist.'
}]
```"#;

    fn doc(id: &str, department: &str, priority: &str, description: &str) -> Document {
        Document::from_values([
            "2K".into(),
            id.into(),
            "2024-07-19".into(),
            "John Doe".into(),
            department.into(),
            priority.into(),
            description.into(),
            String::new(),
        ])
    }

    fn answer(department: &str, priority: &str, description: &str) -> String {
        format!(
            "Department: [\"{department}\", \"Mechanical\"]\n\
             Priority: [\"{priority}\", \"Low\"]\n\
             Description of Issue: [\"{description}\", \"b\", \"c\"]\n\
             Requested Actions: [\"Inspect\"]\n\
             Additional Notes: \"\"\n"
        )
    }

    #[tokio::test]
    async fn rephrase_uses_augmentation_prompt() {
        let generator = FakeGenerator::new(["  Pump broke. Send help.\n"]);
        let summary = rephrase_summary(&generator, "The fire pump has failed.")
            .await
            .unwrap();
        assert_eq!(summary, "Pump broke. Send help.");
        let requests = generator.requests.lock().unwrap();
        assert_eq!(
            requests[0].user_prompt,
            "Original Paragraph: The fire pump has failed.\n\nOutput:"
        );
        assert_eq!(requests[0].max_tokens, Some(500));
        assert_eq!(requests[0].temperature, Some(0.9));
        assert_eq!(
            requests[0].system_prompt.as_deref(),
            Some(SUMMARY_AUGMENTATION_SYSTEM_PROMPT)
        );
    }

    #[tokio::test]
    async fn synthetic_records_parse_from_fenced_literal() {
        let generator = FakeGenerator::new([SYNTHETIC]);
        let records = generate_synthetic_records(&generator).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["Department"], Value::String("Deck".into()));
        for record in &records {
            assert!(DOCUMENT_FIELDS.iter().all(|k| record.contains_key(*k)));
        }

        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_records(tmp.path(), &records).unwrap();
        let loaded = formfill_core::load_records(tmp.path()).unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn synthetic_record_missing_key_fails() {
        let generator = FakeGenerator::new([r#"[{"Form Type": "2K"}]"#]);
        let err = generate_synthetic_records(&generator).await.unwrap_err();
        assert!(matches!(err, AiError::Record(_)));
    }

    #[test]
    fn code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
        assert_eq!(strip_code_fence("```\n[1]"), "[1]");
    }

    #[test]
    fn non_list_answer_is_rejected() {
        assert!(matches!(parse_records("{'a': 1}"), Err(AiError::Other(_))));
        assert!(matches!(parse_records("[1, 2]"), Err(AiError::Other(_))));
    }

    #[test]
    fn consensus_picks_most_common_first_seen_on_tie() {
        let forms: Vec<Form> = [
            answer("Electrical", "High", "first"),
            answer("Engineering", "Medium", "second"),
            answer("Engineering", "High", "third"),
            answer("Electrical", "Low", "fourth"),
        ]
        .iter()
        .map(|a| Form::from_fields(&parse_fields(a).unwrap()).unwrap())
        .collect();
        let result = consensus(&forms).unwrap();
        assert_eq!(result.department, "Electrical");
        assert_eq!(result.priority, "High");
        assert_eq!(result.description.primary(), "first");
        assert!(consensus(&[]).is_none());
    }

    #[tokio::test]
    async fn evaluation_scores_and_persists() {
        let documents = vec![
            doc("NAV-1", "Engineering", "High", "Fire pump seal leaking badly"),
            doc("NAV-2", "Electrical", "Low", "Radar display flickers"),
        ];
        let completer = Arc::new(FakeGenerator::new([
            answer("Engineering", "High", "Fire pump seal leaking badly"),
            answer("Engineering", "Low", "Radar screen is dark"),
        ]));
        let rephraser = FakeGenerator::new(["pump leak", "radar flicker"]);
        let engine = QueryEngine::build(
            documents.clone(),
            Arc::new(KeywordEmbedder::new(&["pump", "radar", "leak", "display"])),
            completer.clone(),
        )
        .await
        .unwrap();

        let evaluation = evaluate(&engine, &rephraser, &documents, CompletionStyle::Ranked, 1)
            .await
            .unwrap();
        assert_eq!(evaluation.items.len(), 2);
        assert_eq!(evaluation.items[0].summary, "pump leak");
        assert!((evaluation.items[0].rouge.rouge_l.fmeasure - 1.0).abs() < 1e-9);
        assert!((evaluation.items[0].similarity - 1.0).abs() < 1e-5);
        assert_eq!(evaluation.department.accuracy, 0.5);
        assert_eq!(evaluation.priority.accuracy, 1.0);

        // The rephrased summary, not the original description, drives completion.
        assert!(completer.prompts()[1].contains("Summary of problem: 'radar flicker'"));

        let dir = tempfile::TempDir::new().unwrap();
        let report_path = dir.path().join("results.txt");
        let forms_path = dir.path().join("forms.json");
        evaluation.write_report(&report_path).unwrap();
        evaluation.write_forms(&forms_path).unwrap();

        let report = std::fs::read_to_string(&report_path).unwrap();
        assert!(
            report.starts_with("Department Scores:\n-----------------------------------------\n")
        );
        assert!(report.contains("\nPriority Scores:\n"));
        assert!(report.contains("Generated Summary: radar flicker\n"));
        assert!(!report.contains("Consensus over"));
        assert!(report.contains("Generated Description: Radar screen is dark\n"));
        assert!(report.contains("Actual Description: Radar display flickers\n"));
        assert_eq!(report.matches("Embedding Similarity:").count(), 2);

        let forms: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&forms_path).unwrap()).unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[1]["Department"][0], "Engineering");
        assert_eq!(forms[0]["Additional Notes"], "");
    }

    #[tokio::test]
    async fn first_failure_aborts_run() {
        let documents = vec![doc("NAV-1", "Deck", "Low", "Rust on rail")];
        let engine = QueryEngine::build(
            documents.clone(),
            Arc::new(KeywordEmbedder::new(&["rust"])),
            Arc::new(FakeGenerator::new(["not a form"])),
        )
        .await
        .unwrap();
        let rephraser = FakeGenerator::new(["rusty rail"]);
        let err = evaluate(&engine, &rephraser, &documents, CompletionStyle::Ranked, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Form(_)));
    }

    #[tokio::test]
    async fn samples_are_scored_on_consensus() {
        let documents = vec![doc("NAV-7", "Electrical", "High", "Gyro repeater dead")];
        let completer = Arc::new(FakeGenerator::new([
            answer("Deck", "High", "Gyro repeater dead"),
            answer("Electrical", "Low", "Gyro failed"),
            answer("Electrical", "High", "Repeater out"),
        ]));
        let engine = QueryEngine::build(
            documents.clone(),
            Arc::new(KeywordEmbedder::new(&["gyro", "repeater"])),
            completer.clone(),
        )
        .await
        .unwrap();
        let rephraser = FakeGenerator::new(["gyro out"]);

        let evaluation = evaluate(&engine, &rephraser, &documents, CompletionStyle::Ranked, 3)
            .await
            .unwrap();
        assert_eq!(completer.prompts().len(), 3);
        let item = &evaluation.items[0];
        assert_eq!(item.samples, 3);
        assert_eq!(item.predicted.department.primary(), "Deck");
        assert_eq!(item.consensus.department, "Electrical");
        assert_eq!(item.consensus.priority, "High");
        assert_eq!(item.generated_description(), "Gyro repeater dead");
        assert_eq!(evaluation.department.accuracy, 1.0);
        assert_eq!(evaluation.priority.accuracy, 1.0);
        assert!(
            evaluation
                .render_report()
                .contains("Consensus over 3 samples: Electrical / High\n")
        );
    }
}

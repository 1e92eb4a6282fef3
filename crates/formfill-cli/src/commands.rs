//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use formfill_ai::eval::{evaluate, generate_synthetic_records, write_records};
use formfill_ai::{
    CompletionStyle, QueryEngine, complete_form, embedding, generate, regenerate,
};
use formfill_core::{
    BackendKind, Config, Document, EmbeddingBackend, Field, Form, RegenerationRequest,
    build_documents, load_records,
};
use formfill_store::ScoredDocument;
use tracing::info;

use crate::display::print_form_card;

/// API keys from flags or the environment.
#[derive(Debug, Default, Clone)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub replicate: Option<String>,
}

/// Load the config file (or defaults) and fill in any API key the file
/// leaves unset.
pub fn load_config(path: Option<&Path>, keys: &ApiKeys) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    apply_keys(&mut config, keys);
    Ok(config)
}

fn apply_keys(config: &mut Config, keys: &ApiKeys) {
    for generation in [
        &mut config.completion,
        &mut config.feedback,
        &mut config.synthetic,
    ] {
        if generation.api_key.is_none() {
            generation.api_key = match generation.backend {
                BackendKind::OpenAi => keys.openai.clone(),
                BackendKind::Replicate => keys.replicate.clone(),
            };
        }
    }
    if config.embedding.api_key.is_none()
        && config.embedding.backend == EmbeddingBackend::OpenAi
    {
        config.embedding.api_key = keys.openai.clone();
    }
}

pub fn load_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let records = load_records(path).with_context(|| format!("reading {}", path.display()))?;
    let documents = build_documents(&records)
        .with_context(|| format!("building documents from {}", path.display()))?;
    Ok(documents)
}

/// Parse repeated `Field=feedback` arguments.
pub fn parse_feedback(items: &[String]) -> anyhow::Result<RegenerationRequest> {
    let mut request = RegenerationRequest::new();
    for item in items {
        let Some((field, text)) = item.split_once('=') else {
            bail!("feedback `{item}` must look like FIELD=TEXT");
        };
        let field: Field = field.parse()?;
        let text = text.trim();
        if text.is_empty() {
            bail!("feedback for `{field}` is empty");
        }
        request.insert(field, text);
    }
    Ok(request)
}

fn write_form(path: &Path, form: &Form) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(form)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote form");
    Ok(())
}

fn show_form(form: &Form, sources: &[ScoredDocument], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(form)?);
    } else {
        print_form_card(form, sources);
    }
    Ok(())
}

pub struct CompleteArgs {
    pub summary: String,
    pub records: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub style: CompletionStyle,
    pub top_k: Option<usize>,
    pub out: Option<PathBuf>,
    pub json: bool,
}

pub async fn complete(config: &Config, args: CompleteArgs) -> anyhow::Result<()> {
    let embedder = embedding::from_config(&config.embedding)?;
    let generator = generate::from_config(&config.completion)?;

    let engine = match (&args.db, &args.records) {
        #[cfg(feature = "lancedb")]
        (Some(db), _) => {
            let index = formfill_store::LanceIndex::open(db)
                .await
                .with_context(|| format!("opening LanceDB at {}", db.display()))?;
            QueryEngine::new(std::sync::Arc::new(index), embedder, generator)
        }
        (_, Some(records)) => QueryEngine::build(load_documents(records)?, embedder, generator)
            .await
            .context("indexing records")?,
        _ => bail!("pass --records (or --db with the lancedb feature)"),
    };
    let engine = engine.with_top_k(args.top_k.unwrap_or(config.retrieval.top_k));

    let completion = complete_form(&engine, &args.summary, args.style)
        .await
        .context("completing form")?;
    if let Some(out) = &args.out {
        write_form(out, &completion.form)?;
    }
    show_form(&completion.form, &completion.sources, args.json)
}

pub async fn regenerate_form(
    config: &Config,
    form_path: &Path,
    feedback: &[String],
    out: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(form_path)
        .with_context(|| format!("reading {}", form_path.display()))?;
    let form: Form = serde_json::from_str(&text)
        .with_context(|| format!("parsing form {}", form_path.display()))?;
    let request = parse_feedback(feedback)?;

    let generator = generate::from_config(&config.feedback)?;
    let updated = regenerate(generator.as_ref(), &form, &request)
        .await
        .context("regenerating fields")?;
    if let Some(out) = out {
        write_form(out, &updated)?;
    }
    show_form(&updated, &[], json)
}

pub async fn synth(config: &Config, out: &Path) -> anyhow::Result<()> {
    let generator = generate::from_config(&config.synthetic)?;
    let records = generate_synthetic_records(generator.as_ref())
        .await
        .context("generating synthetic records")?;
    write_records(out, &records)?;
    eprintln!("Wrote {} records to {}", records.len(), out.display());
    Ok(())
}

pub struct EvaluateArgs {
    pub records: PathBuf,
    pub report: Option<PathBuf>,
    pub forms: Option<PathBuf>,
    pub limit: Option<usize>,
    pub samples: usize,
    pub style: CompletionStyle,
}

/// Default report path, stamped with the local time.
pub fn default_report_path(now: chrono::DateTime<chrono::Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S");
    PathBuf::from("model_results").join(format!("results_{stamp}.txt"))
}

pub async fn run_evaluation(config: &Config, args: EvaluateArgs) -> anyhow::Result<()> {
    let documents = load_documents(&args.records)?;
    let embedder = embedding::from_config(&config.embedding)?;
    let completer = generate::from_config(&config.completion)?;
    let rephraser = generate::from_config(&config.synthetic)?;

    let engine = QueryEngine::build(documents.clone(), embedder, completer)
        .await
        .context("indexing records")?
        .with_top_k(config.retrieval.top_k);
    let targets = match args.limit {
        Some(n) => &documents[..n.min(documents.len())],
        None => &documents[..],
    };

    let evaluation = evaluate(
        &engine,
        rephraser.as_ref(),
        targets,
        args.style,
        args.samples,
    )
        .await
        .context("evaluation run")?;

    let report = args
        .report
        .unwrap_or_else(|| default_report_path(chrono::Local::now()));
    let forms = args
        .forms
        .unwrap_or_else(|| PathBuf::from("model_results/forms.json"));
    for path in [&report, &forms] {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    evaluation.write_report(&report)?;
    evaluation.write_forms(&forms)?;

    eprintln!("Department Scores:\n{}", evaluation.department);
    eprintln!("Priority Scores:\n{}", evaluation.priority);
    eprintln!("Report: {}\nForms:  {}", report.display(), forms.display());
    Ok(())
}

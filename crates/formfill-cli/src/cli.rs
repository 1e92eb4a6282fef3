//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use formfill_ai::CompletionStyle;

#[derive(Parser)]
#[command(name = "formfill")]
#[command(
    about = "Retrieval-augmented completion of ship maintenance request forms",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// JSON config file; every section is optional
    #[arg(long, global = true, env = "FORMFILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Key for OpenAI-compatible chat and embedding endpoints
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Token for Replicate predictions
    #[arg(long, global = true, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    pub replicate_api_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Complete a form from a short problem summary
    Complete {
        /// Free-text summary of the maintenance problem
        summary: String,

        /// Historical records (JSON array) to retrieve from
        #[arg(long)]
        records: Option<PathBuf>,

        /// LanceDB directory built with `formfill index`
        #[cfg(feature = "lancedb")]
        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Style::Ranked)]
        style: Style,

        /// Number of similar records placed in the prompt
        #[arg(long)]
        top_k: Option<usize>,

        /// Write the completed form as JSON
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print JSON instead of the form card
        #[arg(long)]
        json: bool,
    },

    /// Regenerate selected fields of a form from feedback
    Regenerate {
        /// Form JSON, as written by `complete --out`
        #[arg(long)]
        form: PathBuf,

        /// `Field=feedback`; repeat for several fields
        #[arg(long = "feedback", required = true, value_name = "FIELD=TEXT")]
        feedback: Vec<String>,

        /// Write the updated form as JSON
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print JSON instead of the form card
        #[arg(long)]
        json: bool,
    },

    /// Embed records and store them in LanceDB
    #[cfg(feature = "lancedb")]
    Index {
        #[arg(long)]
        records: PathBuf,

        #[arg(long, default_value = "data/lancedb")]
        db: PathBuf,
    },

    /// Generate synthetic maintenance records
    Synth {
        #[arg(long)]
        out: PathBuf,
    },

    /// Score form completion against reference records
    Evaluate {
        #[arg(long)]
        records: PathBuf,

        /// Results text file (default: model_results/results_<timestamp>.txt)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Generated forms JSON (default: model_results/forms.json)
        #[arg(long)]
        forms: Option<PathBuf>,

        /// Evaluate only the first N records
        #[arg(long)]
        limit: Option<usize>,

        /// Completions per summary; Department and Priority are scored on
        /// the most common answer
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        samples: u32,

        #[arg(long, value_enum, default_value_t = Style::Ranked)]
        style: Style,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Style {
    /// Ranked Department/Priority and three description variants
    Ranked,
    /// One value per field
    Single,
}

impl From<Style> for CompletionStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Ranked => CompletionStyle::Ranked,
            Style::Single => CompletionStyle::Single,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_feedback() {
        let cli = Cli::try_parse_from([
            "formfill",
            "regenerate",
            "--form",
            "form.json",
            "--feedback",
            "Additional Notes=mention the radiator type",
            "--feedback",
            "description_of_issue=broken valve",
        ])
        .unwrap();
        match cli.command {
            Commands::Regenerate { feedback, .. } => assert_eq!(feedback.len(), 2),
            _ => panic!("expected regenerate"),
        }
    }

    #[test]
    fn complete_defaults() {
        let cli =
            Cli::try_parse_from(["formfill", "complete", "HVAC leak", "--records", "r.json"])
                .unwrap();
        match cli.command {
            Commands::Complete {
                summary,
                style,
                top_k,
                ..
            } => {
                assert_eq!(summary, "HVAC leak");
                assert!(matches!(style, Style::Ranked));
                assert_eq!(top_k, None);
            }
            _ => panic!("expected complete"),
        }
    }

    #[test]
    fn evaluate_samples_default_and_floor() {
        let cli = Cli::try_parse_from(["formfill", "evaluate", "--records", "r.json"]).unwrap();
        match cli.command {
            Commands::Evaluate { samples, .. } => assert_eq!(samples, 1),
            _ => panic!("expected evaluate"),
        }
        assert!(
            Cli::try_parse_from(["formfill", "evaluate", "--records", "r.json", "--samples", "0"])
                .is_err()
        );
    }
}

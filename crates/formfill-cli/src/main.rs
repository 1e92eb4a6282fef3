mod cli;
mod commands;
mod display;
#[cfg(feature = "lancedb")]
mod index;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{ApiKeys, CompleteArgs, EvaluateArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("formfill v{}", env!("CARGO_PKG_VERSION"));

    let keys = ApiKeys {
        openai: cli.openai_api_key,
        replicate: cli.replicate_api_token,
    };
    let config = commands::load_config(cli.config.as_deref(), &keys)?;

    match cli.command {
        Commands::Complete {
            summary,
            records,
            #[cfg(feature = "lancedb")]
            db,
            style,
            top_k,
            out,
            json,
        } => {
            #[cfg(not(feature = "lancedb"))]
            let db = None;
            commands::complete(
                &config,
                CompleteArgs {
                    summary,
                    records,
                    db,
                    style: style.into(),
                    top_k,
                    out,
                    json,
                },
            )
            .await
        }
        Commands::Regenerate {
            form,
            feedback,
            out,
            json,
        } => commands::regenerate_form(&config, &form, &feedback, out.as_deref(), json).await,
        #[cfg(feature = "lancedb")]
        Commands::Index { records, db } => {
            use anyhow::Context;

            let embedder = formfill_ai::embedding::from_config(&config.embedding)?;
            let lance = formfill_store::LanceIndex::open(&db)
                .await
                .with_context(|| format!("opening LanceDB at {}", db.display()))?;
            eprintln!("Indexing {} into {}", records.display(), db.display());
            let stats = index::run_index_pipeline(&lance, embedder.as_ref(), &records).await?;
            eprintln!(
                "Done: {} documents indexed in {:.1}s",
                stats.total_rows, stats.elapsed_secs
            );
            Ok(())
        }
        Commands::Synth { out } => commands::synth(&config, &out).await,
        Commands::Evaluate {
            records,
            report,
            forms,
            limit,
            samples,
            style,
        } => {
            commands::run_evaluation(
                &config,
                EvaluateArgs {
                    records,
                    report,
                    forms,
                    limit,
                    samples: samples as usize,
                    style: style.into(),
                },
            )
            .await
        }
    }
}

//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::QaEngine;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(
    path: &str,
    corpus: Option<String>,
    version: Option<String>,
    force: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let corpus_id = corpus.unwrap_or_else(|| settings.corpus.corpus_id.clone());
    let version = version.unwrap_or_else(|| settings.corpus.version.clone());

    let engine = QaEngine::new(settings)?;

    let spinner = Output::spinner(&format!("Indexing {} (corpus {})...", path, corpus_id));
    match engine.ingest(path, &corpus_id, &version, force).await {
        Ok(result) if result.skipped => {
            spinner.finish_and_clear();
            Output::info(&format!(
                "Corpus {} is already indexed. Use --force to re-index.",
                result.corpus_id
            ));
        }
        Ok(result) => {
            spinner.finish_and_clear();
            Output::success(&format!(
                "Indexed corpus {} v{}: {} scenes, {} lines, {} chunks",
                result.corpus_id, result.version, result.scenes, result.lines, result.chunks_indexed
            ));
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

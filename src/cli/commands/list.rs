//! List command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::QaEngine;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    preflight::check(Operation::List)?;

    let engine = QaEngine::new(settings)?;
    let corpora = engine.list_corpora().await?;

    if corpora.is_empty() {
        Output::info("No corpora indexed yet. Use 'replikk ingest <script>' to add one.");
        return Ok(());
    }

    Output::header("Indexed corpora");
    for corpus in &corpora {
        Output::corpus_info(&corpus.corpus_id, &corpus.version, corpus.chunk_count);
    }

    Ok(())
}

//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::QaEngine;
use crate::index::ChunkFilter;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: usize,
    speaker: Option<String>,
    scene: Option<String>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let engine = QaEngine::new(settings)?;
    let filter = ChunkFilter { speaker, scene };

    let results = engine.search(query, Some(limit), &filter).await?;

    if results.is_empty() {
        Output::info("No relevant chunks found.");
        return Ok(());
    }

    Output::success(&format!("Found {} result(s)", results.len()));
    for result in &results {
        Output::search_result(
            &result.record.chunk_id,
            &result.record.scene,
            result.score,
            &result.record.text,
        );
    }

    Ok(())
}

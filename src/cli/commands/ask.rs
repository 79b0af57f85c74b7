//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::engine::QaEngine;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, show_steps: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let engine = QaEngine::new(settings)?;

    let spinner = Output::spinner("Searching the script...");

    match engine.ask(question).await {
        Ok(outcome) => {
            spinner.finish_and_clear();

            println!("\n{}\n", outcome.answer.text);
            Output::kv("Status", &outcome.answer.status.to_string());

            if !outcome.answer.citations.is_empty() {
                Output::header("Citations");
                for citation in &outcome.answer.citations {
                    Output::citation(citation.marker, &citation.chunk_id, &citation.quote);
                }
            }

            if show_steps {
                Output::header("Reasoning steps");
                for step in &outcome.steps {
                    Output::list_item(&format!(
                        "[{}] {} -> {} ({} citations)",
                        step.kind, step.query, step.status, step.citations
                    ));
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

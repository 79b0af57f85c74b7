//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use crate::error::ReplikkError;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, mut settings: Settings) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content = toml::to_string_pretty(&settings)
                .map_err(|e| ReplikkError::Config(e.to_string()))?;
            println!("{}", content);
        }

        ConfigAction::Path => {
            println!("{}", Settings::default_config_path().display());
        }

        ConfigAction::Set { key, value } => {
            set_value(&mut settings, key, value)?;
            settings.save()?;
            Output::success(&format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn set_value(settings: &mut Settings, key: &str, value: &str) -> Result<(), ReplikkError> {
    let parse_err = |e: String| ReplikkError::Config(format!("invalid value for {}: {}", key, e));

    match key {
        "general.data_dir" => settings.general.data_dir = value.to_string(),
        "general.log_level" => settings.general.log_level = value.to_string(),
        "corpus.corpus_id" => settings.corpus.corpus_id = value.to_string(),
        "corpus.version" => settings.corpus.version = value.to_string(),
        "segmenter.max_tokens" => {
            settings.segmenter.max_tokens =
                value.parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?
        }
        "segmenter.overlap_tokens" => {
            settings.segmenter.overlap_tokens =
                value.parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?
        }
        "embedding.model" => settings.embedding.model = value.to_string(),
        "embedding.dimensions" => {
            settings.embedding.dimensions =
                value.parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?
        }
        "index.provider" => settings.index.provider = value.to_string(),
        "index.sqlite_path" => settings.index.sqlite_path = value.to_string(),
        "retrieval.top_k" => {
            settings.retrieval.top_k =
                value.parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?
        }
        "retrieval.min_score" => {
            settings.retrieval.min_score =
                value.parse().map_err(|e: std::num::ParseFloatError| parse_err(e.to_string()))?
        }
        "generation.model" => settings.generation.model = value.to_string(),
        "generation.temperature" => {
            settings.generation.temperature =
                value.parse().map_err(|e: std::num::ParseFloatError| parse_err(e.to_string()))?
        }
        "orchestrator.max_subqueries" => {
            settings.orchestrator.max_subqueries =
                value.parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?
        }
        "orchestrator.wall_budget_secs" => {
            settings.orchestrator.wall_budget_secs =
                value.parse().map_err(|e: std::num::ParseIntError| parse_err(e.to_string()))?
        }
        other => {
            return Err(ReplikkError::Config(format!(
                "unknown configuration key: {}",
                other
            )))
        }
    }

    Ok(())
}

//! Thin script loader.
//!
//! Parses a line-oriented screenplay format into [`ScriptRecord`]s:
//! scene headings start with `INT.`, `EXT.` or `SCENE:`; dialogue is
//! `NAME: text` with an upper-case name; any other non-blank line is a stage
//! direction. Files ending in `.jsonl` are read as one record per line,
//! for callers that already have structured scene/speaker data.

use super::{Document, ScriptRecord};
use crate::error::{ReplikkError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, instrument};

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(INT\.|EXT\.|INT/EXT\.|SCENE:)\s*(.+)$").unwrap());

static DIALOGUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z0-9 .'\-]{0,40}):\s+(.+)$").unwrap());

/// Load a script file into a [`Document`].
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_script(path: impl AsRef<Path>, corpus_id: &str, version: &str) -> Result<Document> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let records = if path.extension().is_some_and(|e| e == "jsonl") {
        parse_jsonl(&content)?
    } else {
        parse_text(&content)?
    };

    debug!("Loaded {} lines from {}", records.len(), path.display());
    Document::from_records(corpus_id, version, records)
}

/// Parse JSONL records, one `ScriptRecord` per non-blank line.
pub fn parse_jsonl(content: &str) -> Result<Vec<ScriptRecord>> {
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str::<ScriptRecord>(l)
                .map_err(|e| ReplikkError::Corpus(format!("bad JSONL record: {}", e)))
        })
        .collect()
}

/// Parse screenplay-style text into records.
///
/// A non-blank line before the first scene heading has no scene to belong to
/// and fails segmentation, rather than being silently dropped.
pub fn parse_text(content: &str) -> Result<Vec<ScriptRecord>> {
    let mut records = Vec::new();
    let mut scene: Option<String> = None;
    let mut index = 0;

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            let heading = match caps.get(1).map(|m| m.as_str()) {
                // "SCENE:" is a convenience marker, not part of the heading.
                Some("SCENE:") => caps[2].trim().to_string(),
                _ => line.to_string(),
            };
            scene = Some(heading);
            continue;
        }

        let scene = scene.clone().ok_or_else(|| {
            ReplikkError::Segmentation(format!(
                "line {} appears before any scene heading: {:?}",
                lineno + 1,
                line
            ))
        })?;

        let record = match DIALOGUE_RE.captures(line) {
            Some(caps) => ScriptRecord {
                scene,
                speaker: Some(caps[1].trim().to_string()),
                text: caps[2].trim().to_string(),
                index,
            },
            None => ScriptRecord {
                scene,
                speaker: None,
                text: line.to_string(),
                index,
            },
        };

        records.push(record);
        index += 1;
    }

    Ok(records)
}

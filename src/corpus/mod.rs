//! Script corpus data model.
//!
//! A [`Document`] is the full script for one corpus version: an ordered list
//! of [`Scene`]s, each an ordered list of [`Line`]s. Everything here is built
//! once per ingestion and read-only afterwards.

pub mod loader;

pub use loader::load_script;

use crate::error::{ReplikkError, Result};
use serde::{Deserialize, Serialize};

/// One ingestion record: a single script line with its scene context.
///
/// This is the narrow interface the segmentation pipeline consumes; the
/// loader produces these from raw text, and external loaders can supply them
/// directly (e.g. as JSONL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptRecord {
    /// Scene heading this line belongs to.
    pub scene: String,
    /// Speaker name for dialogue; None for stage directions.
    pub speaker: Option<String>,
    /// Line text.
    pub text: String,
    /// Global sequential line index within the document.
    pub index: usize,
}

/// One utterance or stage direction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Speaker name for dialogue; None for stage directions.
    pub speaker: Option<String>,
    /// Line text.
    pub text: String,
    /// Index of the owning scene within the document.
    pub scene_index: usize,
    /// Global sequential line index within the document.
    pub index: usize,
}

impl Line {
    /// Render the line the way it appears inside chunk text: dialogue keeps
    /// its speaker prefix so attribution survives retrieval.
    pub fn render(&self) -> String {
        match &self.speaker {
            Some(speaker) => format!("{}: {}", speaker, self.text),
            None => self.text.clone(),
        }
    }
}

/// A contiguous script segment under one location/time heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// Scene heading (e.g. "INT. HOTEL ROOM - NIGHT").
    pub heading: String,
    /// Lines in original order.
    pub lines: Vec<Line>,
}

/// The full script for one corpus version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Corpus identifier (e.g. "the-matrix").
    pub corpus_id: String,
    /// Corpus version; chunk identifiers are stamped with it.
    pub version: String,
    /// Scenes in original order.
    pub scenes: Vec<Scene>,
}

impl Document {
    /// Build a document from a sequence of script records.
    ///
    /// Records must arrive in document order; consecutive records sharing a
    /// scene heading land in the same scene.
    pub fn from_records(
        corpus_id: &str,
        version: &str,
        records: Vec<ScriptRecord>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(ReplikkError::Segmentation(
                "document contains no lines".to_string(),
            ));
        }

        let mut scenes: Vec<Scene> = Vec::new();

        for record in records {
            if record.scene.trim().is_empty() {
                return Err(ReplikkError::Segmentation(format!(
                    "line {} cannot be assigned a scene",
                    record.index
                )));
            }

            let needs_new_scene = scenes
                .last()
                .map(|s| s.heading != record.scene)
                .unwrap_or(true);
            if needs_new_scene {
                scenes.push(Scene {
                    heading: record.scene.clone(),
                    lines: Vec::new(),
                });
            }

            let scene_index = scenes.len() - 1;
            scenes
                .last_mut()
                .expect("scene just pushed")
                .lines
                .push(Line {
                    speaker: record.speaker,
                    text: record.text,
                    scene_index,
                    index: record.index,
                });
        }

        Ok(Self {
            corpus_id: corpus_id.to_string(),
            version: version.to_string(),
            scenes,
        })
    }

    /// Total number of lines across all scenes.
    pub fn line_count(&self) -> usize {
        self.scenes.iter().map(|s| s.lines.len()).sum()
    }

    /// Iterate all lines in document order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.scenes.iter().flat_map(|s| s.lines.iter())
    }
}

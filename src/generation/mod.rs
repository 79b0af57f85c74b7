//! Answer types and grounded response generation.

mod grounded;

pub use grounded::GroundedGenerator;

use crate::index::ScoredChunk;
use serde::{Deserialize, Serialize};

/// Refusal text used whenever the excerpts cannot support an answer.
pub const REFUSAL_TEXT: &str = "Insufficient evidence in the provided script excerpts.";

/// Terminal status of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Every claim is supported by cited evidence.
    Answered,
    /// Some sub-questions lacked evidence; the gaps are disclosed in the text.
    PartiallyAnswered,
    /// The corpus does not support an answer. A disclosed outcome, not an error.
    InsufficientEvidence,
    /// Citation verification failed and the cited content was removed.
    Unverified,
}

impl std::fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnswerStatus::Answered => "answered",
            AnswerStatus::PartiallyAnswered => "partially_answered",
            AnswerStatus::InsufficientEvidence => "insufficient_evidence",
            AnswerStatus::Unverified => "unverified",
        };
        write!(f, "{}", s)
    }
}

/// A citation: chunk identifier plus the exact quoted span, referenced from
/// answer text by its `[marker]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Marker number used in the answer text.
    pub marker: usize,
    /// Identifier of the cited chunk.
    pub chunk_id: String,
    /// Quoted span from the chunk text.
    pub quote: String,
}

/// Final or partial answer with its citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text; factual sentences carry `[n]` citation markers.
    pub text: String,
    /// Citations in marker order.
    pub citations: Vec<Citation>,
    /// Terminal status.
    pub status: AnswerStatus,
}

impl Answer {
    /// The disclosed no-evidence outcome.
    pub fn insufficient_evidence() -> Self {
        Self {
            text: REFUSAL_TEXT.to_string(),
            citations: Vec::new(),
            status: AnswerStatus::InsufficientEvidence,
        }
    }
}

/// Format retrieved chunks as numbered excerpts for a generation prompt.
///
/// The excerpt header carries the chunk id so the model can cite it, plus the
/// scene and speakers for context.
pub fn format_excerpts(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let speakers = if c.record.speakers.is_empty() {
                "stage directions".to_string()
            } else {
                c.record.speakers.join(", ")
            };
            format!(
                "[{}] chunk {} | {} | {}\n{}",
                i + 1,
                c.record.chunk_id,
                c.record.scene,
                speakers,
                c.record.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract the outermost JSON object from model output.
///
/// Tolerates code fences and prose around the object; returns None when no
/// braces are present.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

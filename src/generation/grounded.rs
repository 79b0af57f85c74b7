//! Grounded answer generation.
//!
//! The generator is the anti-hallucination boundary: it is never invoked
//! without retrieved context, its prompt forbids outside knowledge, and its
//! output must pair every factual sentence with a citation marker.

use super::{extract_json, format_excerpts, Answer, AnswerStatus, Citation};
use crate::config::Prompts;
use crate::error::{ReplikkError, Result};
use crate::index::ScoredChunk;
use crate::llm::ChatModel;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Raw citation as emitted by the model.
#[derive(Debug, Deserialize)]
struct RawCitation {
    #[serde(rename = "ref")]
    marker: usize,
    chunk_id: String,
    quote: String,
}

/// Raw generation output schema.
#[derive(Debug, Deserialize)]
struct GeneratorOutput {
    status: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

/// Generates answers strictly from supplied chunks.
pub struct GroundedGenerator {
    chat: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl GroundedGenerator {
    pub fn new(chat: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
        Self { chat, prompts }
    }

    /// Answer a query from the given chunks.
    ///
    /// Empty input short-circuits to `InsufficientEvidence` without an LLM
    /// call. Transport failure after retries and malformed model output both
    /// surface as `Generation` errors rather than a fabricated answer.
    #[instrument(skip(self, chunks), fields(query = %query, chunks = chunks.len()))]
    pub async fn answer(&self, query: &str, chunks: &[ScoredChunk]) -> Result<Answer> {
        if chunks.is_empty() {
            debug!("No context supplied; refusing without a generation call");
            return Ok(Answer::insufficient_evidence());
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), query.to_string());
        vars.insert("excerpts".to_string(), format_excerpts(chunks));

        let user = self
            .prompts
            .render_with_custom(&self.prompts.grounded.user, &vars);

        let raw = self
            .chat
            .complete(&self.prompts.grounded.system, &user)
            .await?;

        self.parse_output(&raw)
    }

    fn parse_output(&self, raw: &str) -> Result<Answer> {
        let json = extract_json(raw).ok_or_else(|| {
            ReplikkError::Generation("model output contained no JSON object".to_string())
        })?;

        let output: GeneratorOutput = serde_json::from_str(json).map_err(|e| {
            ReplikkError::Generation(format!("model output did not match schema: {}", e))
        })?;

        match output.status.as_str() {
            "insufficient_evidence" => Ok(Answer::insufficient_evidence()),
            "answered" => {
                let citations = output
                    .citations
                    .into_iter()
                    .map(|c| Citation {
                        marker: c.marker,
                        chunk_id: c.chunk_id,
                        quote: c.quote,
                    })
                    .collect();

                Ok(Answer {
                    text: output.answer,
                    citations,
                    status: AnswerStatus::Answered,
                })
            }
            other => Err(ReplikkError::Generation(format!(
                "model returned unknown status {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ChunkRecord;
    use crate::testing::{keyword_embedding, ScriptedChat};
    use chrono::Utc;

    fn scored(chunk_id: &str, text: &str) -> ScoredChunk {
        ScoredChunk {
            record: ChunkRecord {
                chunk_id: chunk_id.to_string(),
                corpus_id: "matrix".to_string(),
                version: "1".to_string(),
                scene: "INT. NEBUCHADNEZZAR - MAIN DECK".to_string(),
                speakers: vec!["MORPHEUS".to_string()],
                start_line: 0,
                end_line: 0,
                text: text.to_string(),
                token_len: 12,
                embedding: keyword_embedding(text),
                indexed_at: Utc::now(),
            },
            score: 0.9,
        }
    }

    fn prompts() -> Prompts {
        Prompts::default()
    }

    #[tokio::test]
    async fn test_empty_context_refuses_without_llm_call() {
        let chat = Arc::new(ScriptedChat::refusing());
        let generator = GroundedGenerator::new(chat.clone(), prompts());

        let answer = generator.answer("Who is the Merovingian?", &[]).await.unwrap();

        assert_eq!(answer.status, AnswerStatus::InsufficientEvidence);
        assert!(answer.citations.is_empty());
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_answered_output_parses_citations() {
        let response = r#"{
            "status": "answered",
            "answer": "The machines need solar power to survive [1].",
            "citations": [
                {"ref": 1, "chunk_id": "matrix@1:0-0", "quote": "The machines need solar power to survive."}
            ]
        }"#;
        let chat = Arc::new(ScriptedChat::new(vec![response]));
        let generator = GroundedGenerator::new(chat.clone(), prompts());

        let chunks = vec![scored(
            "matrix@1:0-0",
            "MORPHEUS: The machines need solar power to survive.",
        )];
        let answer = generator
            .answer("Who needs solar power to survive?", &chunks)
            .await
            .unwrap();

        assert_eq!(answer.status, AnswerStatus::Answered);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].chunk_id, "matrix@1:0-0");

        // The prompt carried the excerpt and the question.
        let calls = chat.calls();
        assert!(calls[0].1.contains("matrix@1:0-0"));
        assert!(calls[0].1.contains("Who needs solar power to survive?"));
    }

    #[tokio::test]
    async fn test_model_refusal_maps_to_insufficient_evidence() {
        let response = r#"{"status": "insufficient_evidence", "answer": "", "citations": []}"#;
        let chat = Arc::new(ScriptedChat::new(vec![response]));
        let generator = GroundedGenerator::new(chat, prompts());

        let chunks = vec![scored("matrix@1:0-0", "NEO: Whoa.")];
        let answer = generator.answer("What is the Merovingian's plan?", &chunks).await.unwrap();

        assert_eq!(answer.status, AnswerStatus::InsufficientEvidence);
        assert!(answer.citations.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_output_is_a_generation_error() {
        let chat = Arc::new(ScriptedChat::new(vec!["I think the answer is 42."]));
        let generator = GroundedGenerator::new(chat, prompts());

        let chunks = vec![scored("matrix@1:0-0", "NEO: Whoa.")];
        let err = generator.answer("What?", &chunks).await.unwrap_err();
        assert!(matches!(err, ReplikkError::Generation(_)));
    }
}

//! Post-generation citation verification.
//!
//! Every sentence of a final answer must be backed by a citation whose quote
//! actually appears in the cited chunk. Sentences that fail are stripped;
//! an answer left without any verified claim is downgraded to a disclosed
//! `Unverified` status. Nothing uncited or miscited passes through silently.

use crate::generation::{Answer, AnswerStatus, Citation};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

// Moves trailing markers inside the sentence: "survive. [1]" -> "survive [1]."
static MARKER_AFTER_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?])((?:\s*\[\d+\])+)").unwrap());

static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]?").unwrap());

// Disclosure and refusal phrasing is exempt from the citation requirement:
// it claims the absence of evidence, not a fact about the script.
static DISCLOSURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)insufficient evidence|not answerable|cannot be answered|could not be \w+|no relevant|not (?:found|mentioned|supported)|were removed",
    )
    .unwrap()
});

/// Text shown when an answer loses all of its verified content.
pub const UNVERIFIED_TEXT: &str =
    "The generated answer could not be verified against the script excerpts and was withheld.";

/// A claim removed by verification.
#[derive(Debug, Clone)]
pub struct Violation {
    /// The offending sentence or citation quote.
    pub content: String,
    /// Why it was removed.
    pub reason: String,
}

/// Outcome of a guardrail pass.
#[derive(Debug)]
pub struct CheckedAnswer {
    /// The answer after stripping or downgrading.
    pub answer: Answer,
    /// Everything that was removed, for logging.
    pub violations: Vec<Violation>,
}

/// Verifies citations against their source chunks.
pub struct Guardrail;

impl Guardrail {
    pub fn new() -> Self {
        Self
    }

    /// Check an answer against the chunk texts it may cite.
    ///
    /// `sources` maps chunk id to chunk text for every chunk retrieved while
    /// producing the answer.
    pub fn check(&self, answer: Answer, sources: &HashMap<String, String>) -> CheckedAnswer {
        // A refusal carries no factual claims to verify.
        if answer.status == AnswerStatus::InsufficientEvidence {
            return CheckedAnswer {
                answer,
                violations: Vec::new(),
            };
        }

        let mut violations = Vec::new();

        // Verify each citation's quote against its chunk.
        let mut valid_markers: HashSet<usize> = HashSet::new();
        let mut valid_citations: Vec<Citation> = Vec::new();
        for citation in &answer.citations {
            match self.verify_citation(citation, sources) {
                Ok(()) => {
                    valid_markers.insert(citation.marker);
                    valid_citations.push(citation.clone());
                }
                Err(reason) => {
                    violations.push(Violation {
                        content: citation.quote.clone(),
                        reason,
                    });
                }
            }
        }

        // Keep sentences that carry at least one verified marker, plus
        // disclosure sentences, which claim absence rather than fact.
        let normalized_text = MARKER_AFTER_PUNCT_RE.replace_all(&answer.text, "$2$1");
        let mut kept: Vec<String> = Vec::new();
        let mut any_cited = false;

        for m in SENTENCE_RE.find_iter(&normalized_text) {
            let sentence = m.as_str().trim();
            if sentence.is_empty() {
                continue;
            }

            let markers: Vec<usize> = MARKER_RE
                .captures_iter(sentence)
                .filter_map(|c| c[1].parse().ok())
                .collect();

            if markers.iter().any(|m| valid_markers.contains(m)) {
                any_cited = true;
                kept.push(sentence.to_string());
            } else if markers.is_empty() && DISCLOSURE_RE.is_match(sentence) {
                kept.push(sentence.to_string());
            } else {
                let reason = if markers.is_empty() {
                    "factual sentence carries no citation".to_string()
                } else {
                    "sentence cites only unverifiable quotes".to_string()
                };
                violations.push(Violation {
                    content: sentence.to_string(),
                    reason,
                });
            }
        }

        for v in &violations {
            warn!("Guardrail removed {:?}: {}", v.content, v.reason);
        }

        if !any_cited {
            debug!("No verified claim survived; downgrading answer");
            return CheckedAnswer {
                answer: Answer {
                    text: UNVERIFIED_TEXT.to_string(),
                    citations: Vec::new(),
                    status: AnswerStatus::Unverified,
                },
                violations,
            };
        }

        valid_citations.sort_by_key(|c| c.marker);

        CheckedAnswer {
            answer: Answer {
                text: kept.join(" "),
                citations: valid_citations,
                status: answer.status,
            },
            violations,
        }
    }

    fn verify_citation(
        &self,
        citation: &Citation,
        sources: &HashMap<String, String>,
    ) -> std::result::Result<(), String> {
        if citation.quote.trim().is_empty() {
            return Err("citation quote is empty".to_string());
        }

        let chunk_text = sources
            .get(&citation.chunk_id)
            .ok_or_else(|| format!("cited chunk {} was not retrieved", citation.chunk_id))?;

        if normalize(chunk_text).contains(&normalize(&citation.quote)) {
            Ok(())
        } else {
            Err(format!(
                "quote is not a span of chunk {}",
                citation.chunk_id
            ))
        }
    }
}

impl Default for Guardrail {
    fn default() -> Self {
        Self::new()
    }
}

/// Case- and whitespace-insensitive normalization for substring checks.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            "matrix@1:0-0".to_string(),
            "MORPHEUS: The machines need solar power to survive.".to_string(),
        );
        map.insert(
            "matrix@1:1-1".to_string(),
            "NEO: I know kung fu.".to_string(),
        );
        map
    }

    fn citation(marker: usize, chunk_id: &str, quote: &str) -> Citation {
        Citation {
            marker,
            chunk_id: chunk_id.to_string(),
            quote: quote.to_string(),
        }
    }

    #[test]
    fn test_valid_answer_passes_through() {
        let answer = Answer {
            text: "The machines need solar power to survive [1].".to_string(),
            citations: vec![citation(1, "matrix@1:0-0", "machines need solar power")],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::Answered);
        assert!(checked.violations.is_empty());
        assert_eq!(checked.answer.citations.len(), 1);
    }

    #[test]
    fn test_quote_check_normalizes_case_and_whitespace() {
        let answer = Answer {
            text: "The machines need solar power [1].".to_string(),
            citations: vec![citation(1, "matrix@1:0-0", "  THE  machines NEED solar ")],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::Answered);
        assert!(checked.violations.is_empty());
    }

    #[test]
    fn test_miscited_answer_downgraded_to_unverified() {
        let answer = Answer {
            text: "Humans invented the machines [1].".to_string(),
            citations: vec![citation(1, "matrix@1:0-0", "humans invented the machines")],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::Unverified);
        assert!(checked.answer.citations.is_empty());
        assert_eq!(checked.answer.text, UNVERIFIED_TEXT);
        assert_eq!(checked.violations.len(), 2);
    }

    #[test]
    fn test_bad_sentence_stripped_good_one_kept() {
        let answer = Answer {
            text: "The machines need solar power [1]. Neo is the captain of the ship [2].".to_string(),
            citations: vec![
                citation(1, "matrix@1:0-0", "machines need solar power"),
                citation(2, "matrix@1:1-1", "captain of the ship"),
            ],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::Answered);
        assert!(checked.answer.text.contains("solar power"));
        assert!(!checked.answer.text.contains("captain"));
        assert_eq!(checked.answer.citations.len(), 1);
        assert_eq!(checked.violations.len(), 2);
    }

    #[test]
    fn test_uncited_factual_sentence_stripped() {
        let answer = Answer {
            text: "The machines need solar power [1]. Morpheus pilots the ship.".to_string(),
            citations: vec![citation(1, "matrix@1:0-0", "machines need solar power")],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert!(!checked.answer.text.contains("pilots"));
        assert_eq!(checked.violations.len(), 1);
    }

    #[test]
    fn test_disclosure_sentence_exempt() {
        let answer = Answer {
            text: "The machines need solar power [1]. The crew roster is not mentioned in the excerpts.".to_string(),
            citations: vec![citation(1, "matrix@1:0-0", "machines need solar power")],
            status: AnswerStatus::PartiallyAnswered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::PartiallyAnswered);
        assert!(checked.answer.text.contains("not mentioned"));
        assert!(checked.violations.is_empty());
    }

    #[test]
    fn test_markers_after_punctuation_still_attach() {
        let answer = Answer {
            text: "The machines need solar power to survive. [1]".to_string(),
            citations: vec![citation(1, "matrix@1:0-0", "solar power to survive")],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::Answered);
        assert!(checked.violations.is_empty());
    }

    #[test]
    fn test_refusal_passes_untouched() {
        let answer = Answer::insufficient_evidence();
        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::InsufficientEvidence);
        assert!(checked.violations.is_empty());
    }

    #[test]
    fn test_unknown_chunk_id_is_invalid() {
        let answer = Answer {
            text: "Trinity flies the helicopter [1].".to_string(),
            citations: vec![citation(1, "matrix@9:9-9", "flies the helicopter")],
            status: AnswerStatus::Answered,
        };

        let checked = Guardrail::new().check(answer, &sources());
        assert_eq!(checked.answer.status, AnswerStatus::Unverified);
    }
}

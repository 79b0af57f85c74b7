//! Query classification and reasoning plans.
//!
//! Classification is a deterministic keyword rule, not model judgment, so it
//! can be unit-tested and never drifts. The plan itself is an explicit
//! tagged-variant list executed by a plain loop.

use crate::error::{ReplikkError, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::sync::LazyLock;

static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhow many times\b|\bhow often\b|\bnumber of times\b|\bcount of\b").unwrap()
});

// A second interrogative clause introduced by a conjunction marks a composed
// query, as does more than one question mark.
static COMPOSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\band\b|\balso\b|\bthen\b)[\s,]+(?:who|what|why|where|when|how|describe)\b")
        .unwrap()
});

/// Deterministic classification of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    /// One retrieval plus one generation.
    Simple,
    /// Aggregate over the whole corpus; answered by exhaustive scan.
    Counting,
    /// Decomposes into sub-queries with a synthesis fan-in.
    Composed,
}

/// Classify a query. Counting takes precedence: a counting question keeps
/// its aggregate semantics even when phrased with a conjunction.
pub fn classify(query: &str) -> QueryClass {
    if COUNT_RE.is_match(query) {
        return QueryClass::Counting;
    }
    if COMPOSED_RE.is_match(query) || query.matches('?').count() > 1 {
        return QueryClass::Composed;
    }
    QueryClass::Simple
}

/// Kind of reasoning step, for step records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Retrieve then generate.
    Answer,
    /// Exhaustive scan and aggregate, no per-match generation.
    Count,
    /// Fan-in generation over sub-answers only.
    Synthesize,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepKind::Answer => "answer",
            StepKind::Count => "count",
            StepKind::Synthesize => "synthesize",
        };
        write!(f, "{}", s)
    }
}

/// One executable node of a reasoning plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    /// Retrieve evidence for a sub-query and generate a grounded answer.
    Answer { query: String },
    /// Count occurrences for a sub-query via exhaustive scan.
    Count { query: String },
}

impl PlanStep {
    pub fn query(&self) -> &str {
        match self {
            PlanStep::Answer { query } | PlanStep::Count { query } => query,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            PlanStep::Answer { .. } => StepKind::Answer,
            PlanStep::Count { .. } => StepKind::Count,
        }
    }

    /// Build the step for a sub-query. Composed sub-queries do not recurse;
    /// decomposition is a single level deep.
    pub fn for_query(query: &str) -> Self {
        match classify(query) {
            QueryClass::Counting => PlanStep::Count {
                query: query.to_string(),
            },
            _ => PlanStep::Answer {
                query: query.to_string(),
            },
        }
    }
}

/// An ordered plan: independent steps fanned out, one synthesis fan-in.
#[derive(Debug, Clone)]
pub struct ReasoningPlan {
    pub steps: Vec<PlanStep>,
    /// Whether a synthesis step joins the fan-out.
    pub needs_synthesis: bool,
}

/// Decomposition of a composed query, as returned by the model.
#[derive(Debug, Deserialize)]
pub struct Decomposition {
    pub subqueries: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// Counting target, as returned by the model.
#[derive(Debug, Deserialize)]
pub struct CountTarget {
    #[serde(default)]
    pub speaker: Option<String>,
    pub phrase: String,
}

/// Compile a phrase into a whitespace-flexible, case-insensitive matcher.
pub fn phrase_regex(phrase: &str) -> Result<Regex> {
    let tokens: Vec<String> = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect();
    if tokens.is_empty() {
        return Err(ReplikkError::InvalidInput(
            "counting phrase is empty".to_string(),
        ));
    }

    RegexBuilder::new(&tokens.join(r"\s+"))
        .case_insensitive(true)
        .build()
        .map_err(|e| ReplikkError::InvalidInput(format!("bad counting phrase: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_queries_classify_simple() {
        // Part-1 style queries are single retrieval questions.
        for query in [
            "Under what circumstances does Neo see a white rabbit?",
            "Who needs solar power to survive?",
            "Describe the Nebuchadnezzar.",
            "Why is there no sunlight in the future?",
        ] {
            assert_eq!(classify(query), QueryClass::Simple, "{}", query);
        }
    }

    #[test]
    fn test_counting_queries_classify_counting() {
        assert_eq!(
            classify("How many times does Morpheus mention that Neo is the One?"),
            QueryClass::Counting
        );
        assert_eq!(
            classify("how often does Smith call Neo 'Mr. Anderson'?"),
            QueryClass::Counting
        );
    }

    #[test]
    fn test_composed_queries_classify_composed() {
        assert_eq!(
            classify("Why are humans similar to a virus? And who says that?"),
            QueryClass::Composed
        );
        assert_eq!(
            classify("What is the purpose of the human fields, and who created them?"),
            QueryClass::Composed
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        let query = "Why are humans similar to a virus? And who says that?";
        assert_eq!(classify(query), classify(query));
    }

    #[test]
    fn test_counting_takes_precedence_over_composed() {
        assert_eq!(
            classify("How many times does Morpheus say it, and who else says it?"),
            QueryClass::Counting
        );
    }

    #[test]
    fn test_plan_step_for_query() {
        assert_eq!(
            PlanStep::for_query("Who says that?").kind(),
            StepKind::Answer
        );
        assert_eq!(
            PlanStep::for_query("How many times does Neo say whoa?").kind(),
            StepKind::Count
        );
    }

    #[test]
    fn test_phrase_regex_flexible_whitespace_and_case() {
        let re = phrase_regex("the One").unwrap();
        assert!(re.is_match("He is the  one."));
        assert!(re.is_match("THE ONE"));
        assert!(!re.is_match("someone"));

        assert!(phrase_regex("   ").is_err());
    }
}

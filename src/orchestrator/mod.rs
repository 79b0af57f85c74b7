//! Reasoning orchestration for composed queries.
//!
//! Classifies each query, builds an explicit plan, fans out independent
//! sub-steps concurrently, joins them in a synthesis step bounded to the
//! sub-answers, and runs the guardrail before anything is returned. The
//! whole run is capped by step and wall-clock budgets.

mod plan;

pub use plan::{classify, phrase_regex, PlanStep, QueryClass, ReasoningPlan, StepKind};

use crate::config::{OrchestratorSettings, Prompts};
use crate::error::{ReplikkError, Result};
use crate::generation::{extract_json, Answer, AnswerStatus, Citation, GroundedGenerator};
use crate::guardrail::Guardrail;
use crate::index::ChunkFilter;
use crate::llm::ChatModel;
use crate::retrieval::Retriever;
use plan::{CountTarget, Decomposition};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, instrument, warn, Instrument};
use uuid::Uuid;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").unwrap());

/// Record of one executed reasoning step.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// The sub-query this step answered.
    pub query: String,
    /// Step kind.
    pub kind: StepKind,
    /// Terminal status of the partial answer.
    pub status: AnswerStatus,
    /// Partial answer text.
    pub answer: String,
    /// Number of citations the step produced.
    pub citations: usize,
}

/// Final outcome of an orchestration run.
#[derive(Debug)]
pub struct QueryOutcome {
    /// The verified final answer.
    pub answer: Answer,
    /// Executed steps, in plan order (synthesis last when present).
    pub steps: Vec<StepRecord>,
}

/// Output of one executed sub-step, before synthesis.
struct StepOutcome {
    record: StepRecord,
    answer: Answer,
    sources: HashMap<String, String>,
}

/// Drives retrieval and generation across a reasoning plan.
pub struct ReasoningOrchestrator {
    retriever: Arc<Retriever>,
    generator: Arc<GroundedGenerator>,
    chat: Arc<dyn ChatModel>,
    prompts: Prompts,
    guardrail: Guardrail,
    max_subqueries: usize,
    wall_budget: Duration,
}

impl ReasoningOrchestrator {
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<GroundedGenerator>,
        chat: Arc<dyn ChatModel>,
        prompts: Prompts,
        settings: &OrchestratorSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            chat,
            prompts,
            guardrail: Guardrail::new(),
            max_subqueries: settings.max_subqueries,
            wall_budget: Duration::from_secs(settings.wall_budget_secs),
        }
    }

    /// Answer a query, running the full classify/plan/execute/verify cycle.
    ///
    /// A run that outlives the wall-clock budget terminates with
    /// `BudgetExceeded` instead of running unbounded.
    pub async fn answer(&self, query: &str) -> Result<QueryOutcome> {
        self.answer_with_hint(query, None).await
    }

    /// Answer a query with an optional caller-supplied intent hint, which
    /// overrides keyword classification.
    pub async fn answer_with_hint(
        &self,
        query: &str,
        hint: Option<QueryClass>,
    ) -> Result<QueryOutcome> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("orchestration", %run_id);

        tokio::time::timeout(self.wall_budget, self.run(query, hint).instrument(span))
            .await
            .map_err(|_| {
                ReplikkError::BudgetExceeded(format!(
                    "orchestration exceeded wall-clock budget of {:?}",
                    self.wall_budget
                ))
            })?
    }

    #[instrument(skip(self, hint), fields(query = %query))]
    async fn run(&self, query: &str, hint: Option<QueryClass>) -> Result<QueryOutcome> {
        let class = hint.unwrap_or_else(|| classify(query));
        info!("Classified query as {:?}", class);

        let plan = self.plan(query, class).await?;

        // Fan-out: independent sub-steps run concurrently; any hard error in
        // a step fails the run.
        let outcomes: Vec<StepOutcome> = futures::future::join_all(
            plan.steps.iter().map(|step| self.run_step(step)),
        )
        .await
        .into_iter()
        .collect::<Result<_>>()?;

        if !plan.needs_synthesis {
            let outcome = outcomes
                .into_iter()
                .next()
                .ok_or_else(|| ReplikkError::Generation("empty reasoning plan".to_string()))?;
            let checked = self.guardrail.check(outcome.answer, &outcome.sources);
            return Ok(QueryOutcome {
                answer: checked.answer,
                steps: vec![outcome.record],
            });
        }

        self.synthesize(query, outcomes).await
    }

    /// Build the explicit plan for a classified query.
    async fn plan(&self, query: &str, class: QueryClass) -> Result<ReasoningPlan> {
        match class {
            QueryClass::Simple => Ok(ReasoningPlan {
                steps: vec![PlanStep::Answer {
                    query: query.to_string(),
                }],
                needs_synthesis: false,
            }),
            QueryClass::Counting => Ok(ReasoningPlan {
                steps: vec![PlanStep::Count {
                    query: query.to_string(),
                }],
                needs_synthesis: false,
            }),
            QueryClass::Composed => {
                let decomposition = self.decompose(query).await?;
                if decomposition.subqueries.is_empty() {
                    return Err(ReplikkError::Generation(
                        "decomposition produced no sub-queries".to_string(),
                    ));
                }
                if decomposition.subqueries.len() > self.max_subqueries {
                    return Err(ReplikkError::BudgetExceeded(format!(
                        "decomposition produced {} sub-queries, budget is {}",
                        decomposition.subqueries.len(),
                        self.max_subqueries
                    )));
                }

                debug!("Decomposition reasoning: {}", decomposition.reasoning);
                Ok(ReasoningPlan {
                    steps: decomposition
                        .subqueries
                        .iter()
                        .map(|q| PlanStep::for_query(q))
                        .collect(),
                    needs_synthesis: true,
                })
            }
        }
    }

    async fn decompose(&self, query: &str) -> Result<Decomposition> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), query.to_string());
        let user = self
            .prompts
            .render_with_custom(&self.prompts.decompose.user, &vars);

        let raw = self.chat.complete(&self.prompts.decompose.system, &user).await?;
        let json = extract_json(&raw).ok_or_else(|| {
            ReplikkError::Generation("decomposition output contained no JSON".to_string())
        })?;
        serde_json::from_str(json).map_err(|e| {
            ReplikkError::Generation(format!("decomposition did not match schema: {}", e))
        })
    }

    async fn run_step(&self, step: &PlanStep) -> Result<StepOutcome> {
        let (answer, sources) = match step {
            PlanStep::Answer { query } => self.run_answer_step(query).await?,
            PlanStep::Count { query } => self.run_count_step(query).await?,
        };

        Ok(StepOutcome {
            record: StepRecord {
                query: step.query().to_string(),
                kind: step.kind(),
                status: answer.status,
                answer: answer.text.clone(),
                citations: answer.citations.len(),
            },
            answer,
            sources,
        })
    }

    /// Retrieve evidence and generate a grounded partial answer.
    async fn run_answer_step(&self, query: &str) -> Result<(Answer, HashMap<String, String>)> {
        let retrieved = self
            .retriever
            .search(query, None, &ChunkFilter::any())
            .await?;

        let sources: HashMap<String, String> = retrieved
            .iter()
            .map(|r| (r.record.chunk_id.clone(), r.record.text.clone()))
            .collect();

        let answer = self.generator.answer(query, &retrieved).await?;
        Ok((answer, sources))
    }

    /// Count occurrences via exhaustive scan; no generation call per match.
    ///
    /// Overlapping chunks never double-count: each global line is visited
    /// once, in document order.
    async fn run_count_step(&self, query: &str) -> Result<(Answer, HashMap<String, String>)> {
        let target = self.extract_count_target(query).await?;
        let phrase_re = phrase_regex(&target.phrase)?;

        let filter = match &target.speaker {
            Some(speaker) => ChunkFilter::for_speaker(speaker),
            None => ChunkFilter::any(),
        };
        let records = self.retriever.scan(&filter).await?;

        let mut count = 0usize;
        let mut citations: Vec<Citation> = Vec::new();
        let mut sources = HashMap::new();
        let mut next_line = 0usize;

        for record in &records {
            for (offset, line) in record.text.lines().enumerate() {
                let global = record.start_line + offset;
                if global < next_line {
                    continue;
                }
                next_line = global + 1;

                if let Some(speaker) = &target.speaker {
                    if !line_spoken_by(line, speaker) {
                        continue;
                    }
                }

                let matches = phrase_re.find_iter(line).count();
                if matches > 0 {
                    count += matches;
                    let quote = phrase_re
                        .find(line)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    citations.push(Citation {
                        marker: citations.len() + 1,
                        chunk_id: record.chunk_id.clone(),
                        quote,
                    });
                    sources.insert(record.chunk_id.clone(), record.text.clone());
                }
            }
        }

        info!(
            "Counted {} occurrence(s) of {:?} across {} chunks",
            count,
            target.phrase,
            records.len()
        );

        if count == 0 {
            // A bare "0" would be an uncitable claim; disclose instead.
            let text = match &target.speaker {
                Some(speaker) => format!(
                    "No lines spoken by {} matching {:?} were found in the script.",
                    speaker, target.phrase
                ),
                None => format!(
                    "No lines matching {:?} were found in the script.",
                    target.phrase
                ),
            };
            return Ok((
                Answer {
                    text,
                    citations: Vec::new(),
                    status: AnswerStatus::InsufficientEvidence,
                },
                sources,
            ));
        }

        let markers: String = (1..=citations.len())
            .map(|i| format!("[{}]", i))
            .collect::<Vec<_>>()
            .join(" ");
        let text = match &target.speaker {
            Some(speaker) => format!(
                "{} says {:?} {} time(s) in the script {}.",
                speaker, target.phrase, count, markers
            ),
            None => format!(
                "The phrase {:?} occurs {} time(s) in the script {}.",
                target.phrase, count, markers
            ),
        };

        Ok((
            Answer {
                text,
                citations,
                status: AnswerStatus::Answered,
            },
            sources,
        ))
    }

    async fn extract_count_target(&self, query: &str) -> Result<CountTarget> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), query.to_string());
        let user = self
            .prompts
            .render_with_custom(&self.prompts.count.user, &vars);

        let raw = self.chat.complete(&self.prompts.count.system, &user).await?;
        let json = extract_json(&raw).ok_or_else(|| {
            ReplikkError::Generation("count extraction output contained no JSON".to_string())
        })?;
        let target: CountTarget = serde_json::from_str(json).map_err(|e| {
            ReplikkError::Generation(format!("count extraction did not match schema: {}", e))
        })?;

        if target.phrase.trim().is_empty() {
            return Err(ReplikkError::Generation(
                "count extraction produced an empty phrase".to_string(),
            ));
        }
        Ok(target)
    }

    /// Fan-in: synthesize sub-answers into one final answer.
    ///
    /// The synthesis prompt sees only the sub-answers and their quotes, never
    /// the raw corpus, so the no-outside-knowledge invariant holds one level
    /// up. Final citations are the union of sub-step citations.
    async fn synthesize(&self, query: &str, outcomes: Vec<StepOutcome>) -> Result<QueryOutcome> {
        let answered: Vec<&StepOutcome> = outcomes
            .iter()
            .filter(|o| o.answer.status == AnswerStatus::Answered)
            .collect();
        let unanswered: Vec<&StepOutcome> = outcomes
            .iter()
            .filter(|o| o.answer.status != AnswerStatus::Answered)
            .collect();

        let mut steps: Vec<StepRecord> = outcomes.iter().map(|o| o.record.clone()).collect();

        if answered.is_empty() {
            info!("No sub-step produced evidence; refusing");
            return Ok(QueryOutcome {
                answer: Answer::insufficient_evidence(),
                steps,
            });
        }

        // Renumber sub-step citations into one global list, rewriting the
        // markers inside each sub-answer to match.
        let mut global_citations: Vec<Citation> = Vec::new();
        let mut subanswer_blocks: Vec<String> = Vec::new();
        let mut merged_sources: HashMap<String, String> = HashMap::new();

        for outcome in &outcomes {
            merged_sources.extend(outcome.sources.clone());

            let mut remap: HashMap<usize, usize> = HashMap::new();
            for citation in &outcome.answer.citations {
                let global_marker = global_citations.len() + 1;
                remap.insert(citation.marker, global_marker);
                global_citations.push(Citation {
                    marker: global_marker,
                    chunk_id: citation.chunk_id.clone(),
                    quote: citation.quote.clone(),
                });
            }

            let remapped_text = MARKER_RE.replace_all(&outcome.answer.text, |caps: &regex::Captures| {
                let local: usize = caps[1].parse().unwrap_or(0);
                match remap.get(&local) {
                    Some(global) => format!("[{}]", global),
                    None => caps[0].to_string(),
                }
            });

            subanswer_blocks.push(format!(
                "- Sub-question: {}\n  Status: {}\n  Answer: {}",
                outcome.record.query, outcome.answer.status, remapped_text
            ));
        }

        let quotes = global_citations
            .iter()
            .map(|c| format!("[{}] chunk {}: {:?}", c.marker, c.chunk_id, c.quote))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), query.to_string());
        vars.insert("subanswers".to_string(), subanswer_blocks.join("\n\n"));
        vars.insert("quotes".to_string(), quotes);

        let user = self
            .prompts
            .render_with_custom(&self.prompts.synthesis.user, &vars);
        let mut text = self
            .chat
            .complete(&self.prompts.synthesis.system, &user)
            .await?;

        // Evidence gaps are disclosed per sub-query, never dropped.
        let status = if unanswered.is_empty() {
            AnswerStatus::Answered
        } else {
            let gaps = unanswered
                .iter()
                .map(|o| o.record.query.clone())
                .collect::<Vec<_>>()
                .join("; ");
            text.push_str(&format!("\n\nNot answerable from the script: {}.", gaps));
            AnswerStatus::PartiallyAnswered
        };

        let synthesized = Answer {
            text,
            citations: global_citations,
            status,
        };

        steps.push(StepRecord {
            query: query.to_string(),
            kind: StepKind::Synthesize,
            status,
            answer: synthesized.text.clone(),
            citations: synthesized.citations.len(),
        });

        let checked = self.guardrail.check(synthesized, &merged_sources);
        if !checked.violations.is_empty() {
            warn!(
                "Guardrail removed {} claim(s) from the synthesized answer",
                checked.violations.len()
            );
        }

        Ok(QueryOutcome {
            answer: checked.answer,
            steps,
        })
    }
}

fn line_spoken_by(line: &str, speaker: &str) -> bool {
    match line.split_once(':') {
        Some((prefix, _)) => prefix.trim().eq_ignore_ascii_case(speaker.trim()),
        None => false,
    }
}

//! Prompt templates for Replikk.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub grounded: GroundedPrompts,
    pub decompose: DecomposePrompts,
    pub count: CountPrompts,
    pub synthesis: SynthesisPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundedPrompts {
    pub system: String,
    pub user: String,
}

impl Default for GroundedPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an assistant that answers questions about a movie script. Answer based ONLY on the provided script excerpts.

CRITICAL RULES:
1. ONLY use information from the provided excerpts - never use general knowledge about the movie
2. If the excerpts do not contain enough information, refuse with status "insufficient_evidence"
3. Every factual sentence in your answer must end with one or more citation markers like [1], placed before the final punctuation
4. Each marker must correspond to a citation object whose "quote" is copied verbatim from the cited excerpt
5. Quote relevant dialogue exactly; do not paraphrase inside quotes

Respond with a single JSON object:
{
  "status": "answered" | "insufficient_evidence",
  "answer": "answer text with [1] markers",
  "citations": [
    {"ref": 1, "chunk_id": "<chunk id from the excerpt header>", "quote": "<verbatim span from that excerpt>"}
  ]
}

If the excerpts cannot support an answer, return status "insufficient_evidence" with an empty citations array."#.to_string(),

            user: r#"Question: {{question}}

Script excerpts:

{{excerpts}}

Answer the question from the excerpts above only."#.to_string(),
        }
    }
}

/// Prompts for decomposing composed queries into sub-queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposePrompts {
    pub system: String,
    pub user: String,
}

impl Default for DecomposePrompts {
    fn default() -> Self {
        Self {
            system: r#"You decompose a composed question about a movie script into independent sub-questions.

Rules:
- Each sub-question must be answerable on its own from script excerpts
- Keep the decomposition minimal: two or three sub-questions is typical
- Preserve the subject of the original question in every sub-question so they stand alone

Respond with a single JSON object:
{"subqueries": ["...", "..."], "reasoning": "one sentence on how you split it"}"#.to_string(),

            user: r#"Question: {{question}}

Decompose it into sub-questions."#.to_string(),
        }
    }
}

/// Prompts for extracting the target of a counting query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountPrompts {
    pub system: String,
    pub user: String,
}

impl Default for CountPrompts {
    fn default() -> Self {
        Self {
            system: r#"You extract the counting target from a question about a movie script.

Identify the speaker whose lines should be counted (null if the question is not about one speaker) and the shortest phrase whose occurrences are being counted.

Respond with a single JSON object:
{"speaker": "NAME" | null, "phrase": "the phrase to count"}"#.to_string(),

            user: r#"Question: {{question}}

Extract the counting target."#.to_string(),
        }
    }
}

/// Prompts for synthesizing sub-answers into a final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SynthesisPrompts {
    fn default() -> Self {
        Self {
            system: r#"You combine sub-answers about a movie script into one final answer.

CRITICAL RULES:
1. Use ONLY the sub-answers and the numbered quotes provided - no outside knowledge
2. Every factual sentence must end with the [n] markers of the quotes that support it, placed before the final punctuation
3. Reuse the marker numbers exactly as given; do not invent new ones
4. If a sub-answer reports missing evidence, do not restate its claim

Respond with the final answer text only."#.to_string(),

            user: r#"Original question: {{question}}

Sub-answers:
{{subanswers}}

Numbered quotes from the script:
{{quotes}}

Write the final answer."#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        // Store custom variables
        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let grounded_path = custom_path.join("grounded.toml");
            if grounded_path.exists() {
                let content = std::fs::read_to_string(&grounded_path)?;
                prompts.grounded = toml::from_str(&content)?;
            }

            let decompose_path = custom_path.join("decompose.toml");
            if decompose_path.exists() {
                let content = std::fs::read_to_string(&decompose_path)?;
                prompts.decompose = toml::from_str(&content)?;
            }

            let count_path = custom_path.join("count.toml");
            if count_path.exists() {
                let content = std::fs::read_to_string(&count_path)?;
                prompts.count = toml::from_str(&content)?;
            }

            let synthesis_path = custom_path.join("synthesis.toml");
            if synthesis_path.exists() {
                let content = std::fs::read_to_string(&synthesis_path)?;
                prompts.synthesis = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        // Start with custom variables, then override with provided vars
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

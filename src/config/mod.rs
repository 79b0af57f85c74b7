//! Configuration module for Replikk.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{
    CountPrompts, DecomposePrompts, GroundedPrompts, Prompts, SynthesisPrompts,
};
pub use settings::{
    CorpusSettings, EmbeddingSettings, GeneralSettings, GenerationSettings, IndexSettings,
    OrchestratorSettings, PromptSettings, RetrievalSettings, RetrySettings, SegmenterSettings,
    Settings,
};

//! Replikk - Grounded Script Question Answering
//!
//! A local-first CLI tool for answering questions about a movie script,
//! grounded exclusively in the script itself.
//!
//! The name "Replikk" comes from the Norwegian word for a spoken line in a
//! play or film.
//!
//! # Overview
//!
//! Replikk allows you to:
//! - Ingest a screenplay into a searchable vector index
//! - Ask questions and get answers cited line-by-line from the script
//! - Count occurrences and answer composed, multi-hop questions
//! - Refuse, rather than guess, when the script holds no evidence
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `corpus` - Script data model and the thin loader
//! - `segmenter` - Overlapping token-window segmentation
//! - `embedding` - Embedding generation
//! - `index` - Vector index abstraction and atomic rebuilds
//! - `retrieval` - Similarity search and exhaustive scans
//! - `generation` - Grounded, citation-carrying answer generation
//! - `orchestrator` - Query classification, decomposition and synthesis
//! - `guardrail` - Post-generation citation verification
//! - `engine` - Pipeline assembly
//!
//! # Example
//!
//! ```rust,no_run
//! use replikk::config::Settings;
//! use replikk::engine::QaEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let engine = QaEngine::new(settings)?;
//!
//!     engine.ingest("the-matrix.txt", "matrix", "1", false).await?;
//!
//!     let outcome = engine.ask("Who needs solar power to survive?").await?;
//!     println!("{}", outcome.answer.text);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod generation;
pub mod guardrail;
pub mod index;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod retry;
pub mod segmenter;

#[cfg(test)]
pub mod testing;

pub use error::{ReplikkError, Result};

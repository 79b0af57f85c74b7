//! Error types for Replikk.

use thiserror::Error;

/// Library-level error type for Replikk operations.
///
/// An evidence gap is not an error: queries the corpus cannot answer resolve
/// to an `InsufficientEvidence` answer status instead.
#[derive(Error, Debug)]
pub enum ReplikkError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Corpus not found: {0}")]
    CorpusNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Replikk operations.
pub type Result<T> = std::result::Result<T, ReplikkError>;

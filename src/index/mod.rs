//! Vector index abstraction for Replikk.
//!
//! Provides a trait-based interface over different index backends. The index
//! is the only shared state in the system: request pipelines read it
//! concurrently, and rebuilds publish a whole corpus at once via
//! [`VectorIndex::replace_corpus`] so readers never see a half-built index.

mod builder;
mod memory;
mod sqlite;

pub use builder::{BuildReport, IndexBuilder};
pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

use crate::error::Result;
use crate::segmenter::Chunk;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk persisted in the index, with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Stable chunk identifier.
    pub chunk_id: String,
    /// Corpus this chunk belongs to.
    pub corpus_id: String,
    /// Corpus version the chunk was built from.
    pub version: String,
    /// Scene heading.
    pub scene: String,
    /// Speakers present in the chunk.
    pub speakers: Vec<String>,
    /// Global index of the first line.
    pub start_line: usize,
    /// Global index of the last line (inclusive).
    pub end_line: usize,
    /// Chunk text (one source line per text line).
    pub text: String,
    /// Approximate token length.
    pub token_len: usize,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl ChunkRecord {
    /// Build a record from a segmented chunk and its embedding.
    pub fn from_chunk(chunk: Chunk, corpus_id: &str, version: &str, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.id,
            corpus_id: corpus_id.to_string(),
            version: version.to_string(),
            scene: chunk.scene,
            speakers: chunk.speakers,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            text: chunk.text,
            token_len: chunk.token_len,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The matched record.
    pub record: ChunkRecord,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Metadata predicate for search and exhaustive scans.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    /// Restrict to chunks where this speaker appears (case-insensitive).
    pub speaker: Option<String>,
    /// Restrict to chunks whose scene heading contains this text
    /// (case-insensitive).
    pub scene: Option<String>,
}

impl ChunkFilter {
    /// Filter that matches every chunk.
    pub fn any() -> Self {
        Self::default()
    }

    /// Restrict to a speaker.
    pub fn for_speaker(speaker: &str) -> Self {
        Self {
            speaker: Some(speaker.to_string()),
            scene: None,
        }
    }

    /// Whether a record passes the filter.
    pub fn matches(&self, record: &ChunkRecord) -> bool {
        if let Some(speaker) = &self.speaker {
            let want = speaker.to_lowercase();
            if !record
                .speakers
                .iter()
                .any(|s| s.to_lowercase() == want)
            {
                return false;
            }
        }
        if let Some(scene) = &self.scene {
            if !record
                .scene
                .to_lowercase()
                .contains(&scene.to_lowercase())
            {
                return false;
            }
        }
        true
    }
}

/// Summary information about an indexed corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusInfo {
    /// Corpus identifier.
    pub corpus_id: String,
    /// Corpus version currently serving.
    pub version: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// When the corpus was indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Atomically replace all records for a corpus with a new set.
    ///
    /// This is the only mutation the lifecycle needs: a rebuild embeds every
    /// chunk first, then publishes here in one step. Readers either see the
    /// old corpus or the new one, never a mixture.
    async fn replace_corpus(
        &self,
        corpus_id: &str,
        version: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<usize>;

    /// Top-k similarity search with score threshold and metadata filter.
    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_score: f32,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>>;

    /// Exhaustive scan of all chunks matching a filter, in document order.
    async fn scan(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>>;

    /// Fetch a single record by chunk id.
    async fn get(&self, chunk_id: &str) -> Result<Option<ChunkRecord>>;

    /// List all indexed corpora.
    async fn list_corpora(&self) -> Result<Vec<CorpusInfo>>;

    /// Check whether a corpus has records.
    async fn is_corpus_indexed(&self, corpus_id: &str) -> Result<bool>;

    /// Total record count across corpora.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Apply threshold, ranking and truncation to raw scored results.
///
/// Equal scores are ordered by original document position so result order is
/// deterministic.
pub fn rank_results(mut results: Vec<ScoredChunk>, k: usize, min_score: f32) -> Vec<ScoredChunk> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.record.start_line.cmp(&b.record.start_line))
    });
    results.truncate(k);
    results
}

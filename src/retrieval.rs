//! Retrieval over the chunk index.
//!
//! Two modes: similarity search for ordinary questions, and exhaustive
//! metadata scans for aggregate questions whose answer depends on the whole
//! corpus (top-k search cannot enumerate every occurrence).

use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{ChunkFilter, ChunkRecord, ScoredChunk, VectorIndex};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retrieves relevant chunks for a query.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            top_k: 10,
            min_score: 0.3,
        }
    }

    /// Set the default number of results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Similarity search: embed the query and return the top-k chunks.
    ///
    /// Returns an empty vector (never an error) when nothing clears the
    /// relevance threshold; callers treat that as "no evidence".
    #[instrument(skip(self), fields(query = %query))]
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let query_embedding = self.embedder.embed(query).await?;
        let k = k.unwrap_or(self.top_k);

        let results = self
            .index
            .search(&query_embedding, k, self.min_score, filter)
            .await?;

        debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// Exhaustive scan of every chunk matching the filter, in document order.
    #[instrument(skip(self))]
    pub async fn scan(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        let results = self.index.scan(filter).await?;
        debug!("Exhaustive scan matched {} chunks", results.len());
        Ok(results)
    }
}

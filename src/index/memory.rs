//! In-memory vector index implementation.
//!
//! Useful for testing and small corpora.

use super::{
    cosine_similarity, rank_results, ChunkFilter, ChunkRecord, CorpusInfo, ScoredChunk,
    VectorIndex,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector index.
pub struct MemoryIndex {
    records: RwLock<HashMap<String, ChunkRecord>>,
}

impl MemoryIndex {
    /// Create a new in-memory index.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn replace_corpus(
        &self,
        corpus_id: &str,
        _version: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<usize> {
        let count = records.len();
        // The replacement map is assembled before the write lock is taken, so
        // the swap itself is a single short critical section.
        let incoming: HashMap<String, ChunkRecord> = records
            .into_iter()
            .map(|r| (r.chunk_id.clone(), r))
            .collect();

        let mut store = self.records.write().unwrap();
        store.retain(|_, r| r.corpus_id != corpus_id);
        store.extend(incoming);
        Ok(count)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_score: f32,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let records = self.records.read().unwrap();

        let results: Vec<ScoredChunk> = records
            .values()
            .filter(|r| filter.matches(r))
            .map(|r| ScoredChunk {
                score: cosine_similarity(query_embedding, &r.embedding),
                record: r.clone(),
            })
            .collect();

        Ok(rank_results(results, k, min_score))
    }

    async fn scan(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        let records = self.records.read().unwrap();
        let mut result: Vec<ChunkRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        result.sort_by_key(|r| r.start_line);
        Ok(result)
    }

    async fn get(&self, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        let records = self.records.read().unwrap();
        Ok(records.get(chunk_id).cloned())
    }

    async fn list_corpora(&self) -> Result<Vec<CorpusInfo>> {
        let records = self.records.read().unwrap();

        let mut corpora: HashMap<String, CorpusInfo> = HashMap::new();
        for record in records.values() {
            let entry = corpora
                .entry(record.corpus_id.clone())
                .or_insert_with(|| CorpusInfo {
                    corpus_id: record.corpus_id.clone(),
                    version: record.version.clone(),
                    chunk_count: 0,
                    indexed_at: record.indexed_at,
                });
            entry.chunk_count += 1;
            if record.indexed_at > entry.indexed_at {
                entry.indexed_at = record.indexed_at;
            }
        }

        let mut result: Vec<CorpusInfo> = corpora.into_values().collect();
        result.sort_by(|a, b| a.corpus_id.cmp(&b.corpus_id));
        Ok(result)
    }

    async fn is_corpus_indexed(&self, corpus_id: &str) -> Result<bool> {
        let records = self.records.read().unwrap();
        Ok(records.values().any(|r| r.corpus_id == corpus_id))
    }

    async fn chunk_count(&self) -> Result<usize> {
        let records = self.records.read().unwrap();
        Ok(records.len())
    }
}

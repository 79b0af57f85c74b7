//! Index construction: embed chunks, then publish atomically.
//!
//! Embedding runs as bounded-concurrency batches; nothing touches the
//! serving index until every chunk has a vector, so a failed build leaves
//! the previous corpus version queryable.

use super::{ChunkRecord, VectorIndex};
use crate::embedding::Embedder;
use crate::error::{ReplikkError, Result};
use crate::segmenter::Chunk;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, instrument};

/// Number of chunk texts sent per embedding request.
const EMBED_BATCH_SIZE: usize = 32;

/// Result of an index build.
#[derive(Debug)]
pub struct BuildReport {
    /// Corpus identifier.
    pub corpus_id: String,
    /// Corpus version that was published.
    pub version: String,
    /// Number of chunks indexed.
    pub chunks_indexed: usize,
}

/// Builds and publishes a corpus index.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    max_concurrency: usize,
}

impl IndexBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Embed all chunks and atomically publish them as the corpus' records.
    #[instrument(skip(self, chunks), fields(corpus_id, version, count = chunks.len()))]
    pub async fn build(
        &self,
        corpus_id: &str,
        version: &str,
        chunks: Vec<Chunk>,
    ) -> Result<BuildReport> {
        if chunks.is_empty() {
            return Err(ReplikkError::IndexBuild(
                "no chunks to index".to_string(),
            ));
        }

        info!(
            "Building index for corpus {} version {} ({} chunks)",
            corpus_id,
            version,
            chunks.len()
        );

        let batches: Vec<Vec<String>> = chunks
            .chunks(EMBED_BATCH_SIZE)
            .map(|batch| batch.iter().map(|c| c.text.clone()).collect())
            .collect();

        // `buffered` keeps batch order, so vectors line up with chunks.
        // Any batch failure aborts the whole build before publication.
        let batch_results: Vec<Result<Vec<Vec<f32>>>> = stream::iter(batches)
            .map(|batch| {
                let embedder = self.embedder.clone();
                async move { embedder.embed_batch(&batch).await }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in batch_results {
            embeddings.extend(batch.map_err(|e| {
                ReplikkError::IndexBuild(format!("embedding failed, index unchanged: {}", e))
            })?);
        }

        if embeddings.len() != chunks.len() {
            return Err(ReplikkError::IndexBuild(format!(
                "embedding count mismatch: {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let expected_dims = self.embedder.dimensions();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                if embedding.len() != expected_dims {
                    return Err(ReplikkError::IndexBuild(format!(
                        "vector for chunk {} has {} dimensions, expected {}",
                        chunk.id,
                        embedding.len(),
                        expected_dims
                    )));
                }
                Ok(ChunkRecord::from_chunk(chunk, corpus_id, version, embedding))
            })
            .collect::<Result<_>>()?;

        let chunks_indexed = self
            .index
            .replace_corpus(corpus_id, version, records)
            .await?;

        info!(
            "Indexed {} chunks for corpus {} version {}",
            chunks_indexed, corpus_id, version
        );

        Ok(BuildReport {
            corpus_id: corpus_id.to_string(),
            version: version.to_string(),
            chunks_indexed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ChunkFilter, MemoryIndex};
    use crate::segmenter::{approx_tokens, chunk_id};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn chunk(start: usize, text: &str) -> Chunk {
        Chunk {
            id: chunk_id("matrix", "1", start, start),
            scene: "INT. TEST - NIGHT".to_string(),
            speakers: vec!["MORPHEUS".to_string()],
            start_line: start,
            end_line: start,
            text: text.to_string(),
            token_len: approx_tokens(text),
        }
    }

    /// Embedder that counts words per dimension bucket; deterministic.
    struct StubEmbedder {
        dims: usize,
        fail_after: Option<usize>,
        calls: AtomicUsize,
    }

    impl StubEmbedder {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_after(dims: usize, calls: usize) -> Self {
            Self {
                dims,
                fail_after: Some(calls),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            let all = self.embed_batch(&[text.to_string()]).await?;
            Ok(all.into_iter().next().unwrap())
        }

        async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_after {
                if n >= limit {
                    return Err(ReplikkError::Embedding("provider down".to_string()));
                }
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; self.dims];
                    for word in t.split_whitespace() {
                        let bucket = word.len() % self.dims;
                        v[bucket] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    #[tokio::test]
    async fn test_build_publishes_all_chunks() {
        let index = Arc::new(MemoryIndex::new());
        let builder = IndexBuilder::new(Arc::new(StubEmbedder::new(4)), index.clone(), 2);

        let chunks = vec![chunk(0, "a b c"), chunk(1, "d e f"), chunk(2, "g h i")];
        let report = builder.build("matrix", "1", chunks).await.unwrap();

        assert_eq!(report.chunks_indexed, 3);
        assert_eq!(index.chunk_count().await.unwrap(), 3);

        let scanned = index.scan(&ChunkFilter::any()).await.unwrap();
        assert!(scanned.iter().all(|r| r.embedding.len() == 4));
    }

    #[tokio::test]
    async fn test_failed_build_leaves_index_unchanged() {
        let index = Arc::new(MemoryIndex::new());

        // Seed a serving version.
        let builder = IndexBuilder::new(Arc::new(StubEmbedder::new(4)), index.clone(), 1);
        builder
            .build("matrix", "1", vec![chunk(0, "old content")])
            .await
            .unwrap();

        // A rebuild that fails mid-embedding must not touch the index. The
        // stub allows zero successful calls, so the first batch errors.
        let failing = IndexBuilder::new(
            Arc::new(StubEmbedder::failing_after(4, 0)),
            index.clone(),
            1,
        );
        let many: Vec<Chunk> = (0..80).map(|i| chunk(i, "new content here")).collect();
        let err = failing.build("matrix", "2", many).await.unwrap_err();
        assert!(matches!(err, ReplikkError::IndexBuild(_)));

        // Old version still serving.
        assert_eq!(index.chunk_count().await.unwrap(), 1);
        let remaining = index.scan(&ChunkFilter::any()).await.unwrap();
        assert_eq!(remaining[0].version, "1");
    }

    #[tokio::test]
    async fn test_build_empty_fails() {
        let index = Arc::new(MemoryIndex::new());
        let builder = IndexBuilder::new(Arc::new(StubEmbedder::new(4)), index, 1);
        let err = builder.build("matrix", "1", vec![]).await.unwrap_err();
        assert!(matches!(err, ReplikkError::IndexBuild(_)));
    }
}

//! SQLite-based vector index implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Corpus rebuilds run as a single transaction, so concurrent readers see
//! either the previous corpus or the new one, never a partial rebuild.

use super::{
    cosine_similarity, rank_results, ChunkFilter, ChunkRecord, CorpusInfo, ScoredChunk,
    VectorIndex,
};
use crate::error::{ReplikkError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    corpus_id TEXT NOT NULL,
    version TEXT NOT NULL,
    scene TEXT NOT NULL,
    speakers TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    text TEXT NOT NULL,
    token_len INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_corpus_id ON chunks(corpus_id);
CREATE INDEX IF NOT EXISTS idx_chunks_start_line ON chunks(start_line);
"#;

const SELECT_COLUMNS: &str = r#"
SELECT chunk_id, corpus_id, version, scene, speakers, start_line, end_line,
       text, token_len, embedding, indexed_at
FROM chunks
"#;

/// SQLite-based vector index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Create a new SQLite index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ReplikkError::Index(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ChunkRecord> {
        let speakers_json: String = row.get(4)?;
        let embedding_bytes: Vec<u8> = row.get(9)?;
        let indexed_at_str: String = row.get(10)?;

        Ok(ChunkRecord {
            chunk_id: row.get(0)?,
            corpus_id: row.get(1)?,
            version: row.get(2)?,
            scene: row.get(3)?,
            speakers: serde_json::from_str(&speakers_json).unwrap_or_default(),
            start_line: row.get::<_, i64>(5)? as usize,
            end_line: row.get::<_, i64>(6)? as usize,
            text: row.get(7)?,
            token_len: row.get::<_, i64>(8)? as usize,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn load_matching(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let rows = stmt.query_map([], Self::row_to_record)?;

        // Speaker/scene predicates are evaluated in Rust: the speakers column
        // is a JSON array and both matches are case-insensitive.
        let result: Vec<ChunkRecord> = rows
            .filter_map(|r| r.ok())
            .filter(|r| filter.matches(r))
            .collect();
        Ok(result)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn replace_corpus(
        &self,
        corpus_id: &str,
        version: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM chunks WHERE corpus_id = ?1", params![corpus_id])?;

        for record in &records {
            let speakers_json = serde_json::to_string(&record.speakers)
                .map_err(|e| ReplikkError::Index(format!("Failed to serialize speakers: {}", e)))?;
            let embedding_bytes = Self::embedding_to_bytes(&record.embedding);

            tx.execute(
                r#"
                INSERT INTO chunks
                (chunk_id, corpus_id, version, scene, speakers, start_line, end_line,
                 text, token_len, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    record.chunk_id,
                    record.corpus_id,
                    version,
                    record.scene,
                    speakers_json,
                    record.start_line as i64,
                    record.end_line as i64,
                    record.text,
                    record.token_len as i64,
                    embedding_bytes,
                    record.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "Published {} chunks for corpus {} version {}",
            records.len(),
            corpus_id,
            version
        );
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
        min_score: f32,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let results: Vec<ScoredChunk> = self
            .load_matching(filter)?
            .into_iter()
            .map(|record| ScoredChunk {
                score: cosine_similarity(query_embedding, &record.embedding),
                record,
            })
            .collect();

        let ranked = rank_results(results, k, min_score);
        debug!("Found {} matching chunks", ranked.len());
        Ok(ranked)
    }

    #[instrument(skip(self))]
    async fn scan(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        let mut result = self.load_matching(filter)?;
        result.sort_by_key(|r| r.start_line);
        debug!("Scan matched {} chunks", result.len());
        Ok(result)
    }

    async fn get(&self, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE chunk_id = ?1", SELECT_COLUMNS);
        let record = conn.query_row(&sql, params![chunk_id], Self::row_to_record);

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_corpora(&self) -> Result<Vec<CorpusInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT corpus_id, MAX(version) as version, COUNT(*) as chunk_count,
                   MAX(indexed_at) as indexed_at
            FROM chunks
            GROUP BY corpus_id
            ORDER BY corpus_id
            "#,
        )?;

        let corpora = stmt.query_map([], |row| {
            let indexed_at_str: String = row.get(3)?;
            Ok(CorpusInfo {
                corpus_id: row.get(0)?,
                version: row.get(1)?,
                chunk_count: row.get(2)?,
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        Ok(corpora.filter_map(|c| c.ok()).collect())
    }

    async fn is_corpus_indexed(&self, corpus_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE corpus_id = ?1",
            params![corpus_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::record;
    use super::*;

    #[tokio::test]
    async fn test_sqlite_index_roundtrip() {
        let index = SqliteIndex::in_memory().unwrap();

        let records = vec![
            record(
                "matrix@1:0-0",
                "matrix",
                &["MORPHEUS"],
                0,
                "MORPHEUS: Welcome to the desert of the real.",
                vec![1.0, 0.0, 0.0],
            ),
            record(
                "matrix@1:1-1",
                "matrix",
                &["NEO"],
                1,
                "NEO: I know kung fu.",
                vec![0.0, 1.0, 0.0],
            ),
        ];

        index.replace_corpus("matrix", "1", records).await.unwrap();

        let corpora = index.list_corpora().await.unwrap();
        assert_eq!(corpora.len(), 1);
        assert_eq!(corpora[0].chunk_count, 2);
        assert!(index.is_corpus_indexed("matrix").await.unwrap());

        let results = index
            .search(&[1.0, 0.0, 0.0], 10, 0.0, &ChunkFilter::any())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].record.chunk_id, "matrix@1:0-0");

        let fetched = index.get("matrix@1:1-1").await.unwrap().unwrap();
        assert_eq!(fetched.speakers, vec!["NEO"]);
        assert_eq!(fetched.embedding, vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_replace_corpus_is_atomic_swap() {
        let index = SqliteIndex::in_memory().unwrap();

        index
            .replace_corpus(
                "matrix",
                "1",
                vec![record("matrix@1:0-0", "matrix", &[], 0, "old", vec![1.0])],
            )
            .await
            .unwrap();

        index
            .replace_corpus(
                "matrix",
                "2",
                vec![
                    record("matrix@2:0-0", "matrix", &[], 0, "new", vec![1.0]),
                    record("matrix@2:1-1", "matrix", &[], 1, "new", vec![1.0]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(index.chunk_count().await.unwrap(), 2);
        assert!(index.get("matrix@1:0-0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_with_speaker_filter() {
        let index = SqliteIndex::in_memory().unwrap();
        index
            .replace_corpus(
                "matrix",
                "1",
                vec![
                    record("c1", "matrix", &["MORPHEUS"], 0, "a", vec![1.0]),
                    record("c2", "matrix", &["NEO"], 1, "b", vec![1.0]),
                    record("c3", "matrix", &["MORPHEUS", "NEO"], 2, "c", vec![1.0]),
                ],
            )
            .await
            .unwrap();

        let scanned = index
            .scan(&ChunkFilter::for_speaker("morpheus"))
            .await
            .unwrap();
        let ids: Vec<&str> = scanned.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn test_on_disk_index_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let index = SqliteIndex::new(&path).unwrap();
            index
                .replace_corpus(
                    "matrix",
                    "1",
                    vec![record("c1", "matrix", &[], 0, "a", vec![1.0])],
                )
                .await
                .unwrap();
        }

        let reopened = SqliteIndex::new(&path).unwrap();
        assert_eq!(reopened.chunk_count().await.unwrap(), 1);
    }
}

//! Pipeline assembly and coordination.
//!
//! Wires settings into concrete components (embedder, index, retriever,
//! generator, orchestrator) and drives the two top-level flows: offline
//! ingestion and online question answering.

use crate::config::{Prompts, Settings};
use crate::corpus::{load_script, Document};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{ReplikkError, Result};
use crate::generation::GroundedGenerator;
use crate::index::{
    ChunkFilter, CorpusInfo, IndexBuilder, MemoryIndex, ScoredChunk, SqliteIndex, VectorIndex,
};
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::orchestrator::{QueryClass, QueryOutcome, ReasoningOrchestrator};
use crate::retrieval::Retriever;
use crate::segmenter::{Segmenter, SegmenterConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// The assembled question-answering engine.
pub struct QaEngine {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retriever: Arc<Retriever>,
    orchestrator: ReasoningOrchestrator,
}

impl QaEngine {
    /// Create an engine from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let policy = settings.retry.policy();
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            policy,
        ));

        let index: Arc<dyn VectorIndex> = match settings.index.provider.as_str() {
            "memory" => Arc::new(MemoryIndex::new()),
            "sqlite" => Arc::new(SqliteIndex::new(&settings.sqlite_path())?),
            other => {
                return Err(ReplikkError::Config(format!(
                    "unknown index provider: {}",
                    other
                )))
            }
        };

        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::with_config(
            &settings.generation.model,
            settings.generation.temperature,
            policy,
        ));

        Self::with_components(settings, prompts, embedder, index, chat)
    }

    /// Create an engine with custom components (used by tests and embedders
    /// other than the default stack).
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let retriever = Arc::new(
            Retriever::new(index.clone(), embedder.clone())
                .with_top_k(settings.retrieval.top_k)
                .with_min_score(settings.retrieval.min_score),
        );

        let generator = Arc::new(GroundedGenerator::new(chat.clone(), prompts.clone()));

        let orchestrator = ReasoningOrchestrator::new(
            retriever.clone(),
            generator,
            chat,
            prompts,
            &settings.orchestrator,
        );

        Ok(Self {
            settings,
            embedder,
            index,
            retriever,
            orchestrator,
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a reference to the index.
    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Ingest a script file: load, segment, embed and publish.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub async fn ingest(
        &self,
        path: impl AsRef<Path>,
        corpus_id: &str,
        version: &str,
        force: bool,
    ) -> Result<IngestResult> {
        if !force && self.index.is_corpus_indexed(corpus_id).await? {
            info!("Corpus {} is already indexed, skipping", corpus_id);
            return Ok(IngestResult {
                corpus_id: corpus_id.to_string(),
                version: version.to_string(),
                scenes: 0,
                lines: 0,
                chunks_indexed: 0,
                skipped: true,
            });
        }

        let document = load_script(path, corpus_id, version)?;
        self.ingest_document(&document).await
    }

    /// Ingest an already-loaded document.
    pub async fn ingest_document(&self, document: &Document) -> Result<IngestResult> {
        info!(
            "Ingesting corpus {} version {} ({} scenes, {} lines)",
            document.corpus_id,
            document.version,
            document.scenes.len(),
            document.line_count()
        );

        let segmenter = Segmenter::new(SegmenterConfig {
            max_tokens: self.settings.segmenter.max_tokens,
            overlap_tokens: self.settings.segmenter.overlap_tokens,
        });
        let chunks = segmenter.segment(document)?;

        let builder = IndexBuilder::new(
            self.embedder.clone(),
            self.index.clone(),
            self.settings.index.max_concurrent_batches,
        );
        let report = builder
            .build(&document.corpus_id, &document.version, chunks)
            .await?;

        Ok(IngestResult {
            corpus_id: report.corpus_id,
            version: report.version,
            scenes: document.scenes.len(),
            lines: document.line_count(),
            chunks_indexed: report.chunks_indexed,
            skipped: false,
        })
    }

    /// Answer a question through the full reasoning pipeline.
    pub async fn ask(&self, query: &str) -> Result<QueryOutcome> {
        self.ask_with_hint(query, None).await
    }

    /// Answer a question with an optional intent hint (e.g. forcing the
    /// counting path) that overrides keyword classification.
    pub async fn ask_with_hint(
        &self,
        query: &str,
        hint: Option<QueryClass>,
    ) -> Result<QueryOutcome> {
        if query.trim().is_empty() {
            return Err(ReplikkError::InvalidInput("empty query".to_string()));
        }
        self.orchestrator.answer_with_hint(query, hint).await
    }

    /// Raw similarity search, for the search command and endpoint.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        self.retriever.search(query, k, filter).await
    }

    /// List indexed corpora.
    pub async fn list_corpora(&self) -> Result<Vec<CorpusInfo>> {
        self.index.list_corpora().await
    }
}

/// Result of an ingestion run.
#[derive(Debug)]
pub struct IngestResult {
    /// Corpus identifier.
    pub corpus_id: String,
    /// Corpus version.
    pub version: String,
    /// Number of scenes loaded.
    pub scenes: usize,
    /// Number of lines loaded.
    pub lines: usize,
    /// Number of chunks indexed.
    pub chunks_indexed: usize,
    /// Whether ingestion was skipped (already indexed).
    pub skipped: bool,
}

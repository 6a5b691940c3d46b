//! The retrieval engine.
//!
//! Owns every process-wide resource the pipeline shares: the lexical
//! indexes, the similarity-search client, and the lazily resolved sidecar
//! handles for reranking and NLI verification. One engine is constructed
//! at startup and shared across requests; all first-use initialization is
//! guarded so concurrent first queries build each resource exactly once.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::chunking::{chunk_text, stable_chunk_id};
use crate::config::Config;
use crate::corpus::{self, load_documents};
use crate::error::{EngineError, Result};
use crate::indexer::{plan, IndexState, IngestReport};
use crate::models::{
    ContextRequest, Document, NliRatios, RetrievalCandidate, ScoredSource, VerifiedAnswer,
};
use crate::search::fusion::{apply_prefilter, rrf_fuse};
use crate::search::lexical::{LazyIndex, LexicalIndex};
use crate::search::rerank::{apply_rerank, CrossEncoderClient, PairwiseScorer};
use crate::snippet::extract_snippet;
use crate::vector::{
    ChunkRecord, EmbeddingClient, SimilaritySearch, VectorSearcher, VectorStoreClient,
};
use crate::verify::{self, NliClassifier, NliSidecarClient};

/// A lazily resolved optional dependency: untouched, confirmed absent, or
/// ready for use. Transitions exactly once, under the owning mutex.
enum Sidecar<T> {
    NotLoaded,
    Unavailable,
    Ready(T),
}

pub struct RetrievalEngine {
    config: Config,
    http: reqwest::Client,
    search: Arc<dyn SimilaritySearch>,
    /// File-granularity BM25 index, keyed by source path.
    file_index: LazyIndex,
    /// Chunk-granularity BM25 index, keyed by `"{source}::{index}"`.
    chunk_index: LazyIndex,
    reranker: Mutex<Sidecar<Arc<dyn PairwiseScorer>>>,
    nli: Mutex<Sidecar<Arc<dyn NliClassifier>>>,
    /// Serializes the check-then-ingest sequence on an empty collection so
    /// concurrent first queries run at most one bulk ingest.
    bootstrap: OnceCell<()>,
}

impl RetrievalEngine {
    /// Engine over the configured embedding backend and vector store.
    pub fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.store.timeout_secs.max(60)))
            .build()?;
        let searcher = VectorSearcher::new(
            EmbeddingClient::new(http.clone(), config.embedding.clone()),
            VectorStoreClient::new(http.clone(), config.store.clone()),
        );
        Ok(Self::with_search_client(config, http, Arc::new(searcher)))
    }

    /// Engine over an externally supplied similarity-search implementation.
    pub fn with_search(config: Config, search: Arc<dyn SimilaritySearch>) -> Self {
        Self::with_search_client(config, reqwest::Client::new(), search)
    }

    fn with_search_client(
        config: Config,
        http: reqwest::Client,
        search: Arc<dyn SimilaritySearch>,
    ) -> Self {
        Self {
            config,
            http,
            search,
            file_index: LazyIndex::new(),
            chunk_index: LazyIndex::new(),
            reranker: Mutex::new(Sidecar::NotLoaded),
            nli: Mutex::new(Sidecar::NotLoaded),
            bootstrap: OnceCell::new(),
        }
    }

    /// Replace the reranker with a specific scorer (used by tests and
    /// embedders that bring their own model).
    pub fn with_reranker(self, scorer: Arc<dyn PairwiseScorer>) -> Self {
        *self.reranker.lock() = Sidecar::Ready(scorer);
        self
    }

    /// Replace the NLI classifier with a specific implementation.
    pub fn with_classifier(self, classifier: Arc<dyn NliClassifier>) -> Self {
        *self.nli.lock() = Sidecar::Ready(classifier);
        self
    }

    // ─── Indexing ────────────────────────────────────────────

    /// Scan the corpus directory and (re)index new or changed documents.
    pub async fn reindex(&self, force: bool) -> Result<IngestReport> {
        let docs = load_documents(&self.config.corpus_dir);
        self.ingest_with_plan(&docs, force).await
    }

    /// Ingest documents handed over by an extraction collaborator.
    /// Documents with an empty title get the derived file stem.
    pub async fn ingest_documents(&self, docs: &[Document]) -> Result<IngestReport> {
        self.ingest_with_plan(docs, false).await
    }

    async fn ingest_with_plan(&self, docs: &[Document], force: bool) -> Result<IngestReport> {
        let state_path = self.config.state_path();
        let prev = IndexState::load(&state_path);
        let (to_index, current) = plan(&prev, docs, force);

        let mut report = IngestReport {
            indexed: 0,
            unchanged: docs.len() - to_index.len(),
            chunks: 0,
        };

        for doc in &to_index {
            let title = if doc.title.trim().is_empty() {
                corpus::file_stem(&doc.source)
            } else {
                doc.title.clone()
            };
            let records: Vec<ChunkRecord> = chunk_text(
                &doc.text,
                self.config.chunk_max_chars,
                self.config.chunk_overlap,
            )
            .into_iter()
            .enumerate()
            .map(|(i, text)| ChunkRecord {
                id: stable_chunk_id(&doc.source, i),
                text,
                source: doc.source.clone(),
                chunk_index: i,
                title: title.clone(),
            })
            .collect();

            if records.is_empty() {
                tracing::debug!("Skipping empty document {}", doc.source);
                continue;
            }

            self.search.upsert(&records).await?;
            report.indexed += 1;
            report.chunks += records.len();
        }

        // The snapshot is rewritten even on a no-op pass so it always
        // reflects the latest scan.
        current.save(&state_path)?;

        if report.indexed > 0 {
            self.file_index.invalidate();
            self.chunk_index.invalidate();
            tracing::info!(
                "Indexed {} documents ({} chunks), {} unchanged",
                report.indexed,
                report.chunks,
                report.unchanged
            );
        }

        Ok(report)
    }

    /// One-time barrier: if the collection is empty, run a full corpus
    /// ingest before the first query. A failed attempt leaves the cell
    /// unset so the next query retries.
    async fn ensure_indexed(&self) -> Result<()> {
        self.bootstrap
            .get_or_try_init(|| async {
                let count = self.search.count().await?;
                if count == 0 {
                    tracing::info!("Vector collection empty; running initial ingest");
                    self.reindex(false).await?;
                }
                Ok::<(), EngineError>(())
            })
            .await?;
        Ok(())
    }

    // ─── Lexical indexes ─────────────────────────────────────

    fn file_level_index(&self) -> Arc<LexicalIndex> {
        self.file_index.get_or_build(|| {
            let docs = load_documents(&self.config.corpus_dir);
            tracing::debug!("Building file-level lexical index over {} documents", docs.len());
            LexicalIndex::build(docs.into_iter().map(|d| (d.source, d.text)))
        })
    }

    fn chunk_level_index(&self) -> Arc<LexicalIndex> {
        self.chunk_index.get_or_build(|| {
            let docs = load_documents(&self.config.corpus_dir);
            let mut items = Vec::new();
            for doc in docs {
                for (i, text) in chunk_text(
                    &doc.text,
                    self.config.chunk_max_chars,
                    self.config.chunk_overlap,
                )
                .into_iter()
                .enumerate()
                {
                    items.push((format!("{}::{}", doc.source, i), text));
                }
            }
            tracing::debug!("Building chunk-level lexical index over {} chunks", items.len());
            LexicalIndex::build(items)
        })
    }

    /// Chunk-granularity lexical ranks (`"{source}::{index}"` → 1-based
    /// rank) for diagnostics and retrieval evaluation. Fusion itself joins
    /// the vector candidates against file-level ranks; see DESIGN.md.
    pub fn chunk_lexical_ranks(&self, query: &str) -> std::collections::HashMap<String, usize> {
        self.chunk_level_index().rank_map(query)
    }

    // ─── Query path ──────────────────────────────────────────

    /// Retrieve, fuse, and optionally rerank candidates for a query.
    pub async fn build_context(&self, req: &ContextRequest) -> Result<Vec<RetrievalCandidate>> {
        let query = req.query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.ensure_indexed().await?;

        // Over-fetch so fusion and the prefilter have room to work.
        let fetch = req.n_results.max(8);
        let mut candidates = match self.search.query(query, fetch).await {
            Ok(candidates) => candidates,
            Err(EngineError::Embedding(e)) => {
                tracing::warn!("Query embedding unavailable; no vector candidates: {e}");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        if req.use_lexical_prefilter {
            let file_index = self.file_level_index();
            let allowed = file_index.top_keys(query, self.config.prefilter_top_files);
            candidates = apply_prefilter(candidates, &allowed);
            rrf_fuse(&mut candidates, &file_index.rank_map(query));
        }

        if req.use_rerank {
            if let Some(scorer) = self.reranker_handle() {
                candidates = apply_rerank(scorer.as_ref(), query, candidates).await;
            }
        }

        candidates.truncate(req.n_results);
        Ok(candidates)
    }

    /// [`build_context`](Self::build_context) with display snippets
    /// attached, in the shape handed to the orchestration layer.
    pub async fn search(&self, req: &ContextRequest) -> Result<Vec<ScoredSource>> {
        let candidates = self.build_context(req).await?;
        Ok(candidates
            .into_iter()
            .map(|c| {
                let snippet = extract_snippet(&c.text);
                let score = c.display_score();
                ScoredSource {
                    text: c.text,
                    source: c.source,
                    title: c.title,
                    score,
                    snippet,
                }
            })
            .collect())
    }

    // ─── Verification ────────────────────────────────────────

    /// Check a generated answer against the retrieval context, removing
    /// contradicted sentences. With no classifier available the answer
    /// passes through unchanged and the ratios carry the unavailable
    /// sentinel.
    pub async fn verify_answer(&self, context: &str, answer: &str) -> VerifiedAnswer {
        match self.nli_handle() {
            Some(nli) => verify::verify_and_revise(nli.as_ref(), context, answer).await,
            None => VerifiedAnswer {
                answer: answer.to_string(),
                ratios: NliRatios::unavailable(),
            },
        }
    }

    // ─── Sidecar handles ─────────────────────────────────────

    fn reranker_handle(&self) -> Option<Arc<dyn PairwiseScorer>> {
        let mut slot = self.reranker.lock();
        if matches!(*slot, Sidecar::NotLoaded) {
            *slot = if self.config.reranker.base_url.is_some() {
                Sidecar::Ready(Arc::new(CrossEncoderClient::new(
                    self.http.clone(),
                    self.config.reranker.clone(),
                )))
            } else {
                tracing::info!("Reranker sidecar not configured; rerank requests keep fused order");
                Sidecar::Unavailable
            };
        }
        match &*slot {
            Sidecar::Ready(scorer) => Some(Arc::clone(scorer)),
            _ => None,
        }
    }

    fn nli_handle(&self) -> Option<Arc<dyn NliClassifier>> {
        let mut slot = self.nli.lock();
        if matches!(*slot, Sidecar::NotLoaded) {
            *slot = if self.config.nli.base_url.is_some() {
                Sidecar::Ready(Arc::new(NliSidecarClient::new(
                    self.http.clone(),
                    self.config.nli.clone(),
                )))
            } else {
                tracing::info!("NLI sidecar not configured; answers pass through unverified");
                Sidecar::Unavailable
            };
        }
        match &*slot {
            Sidecar::Ready(classifier) => Some(Arc::clone(classifier)),
            _ => None,
        }
    }
}

//! Vector retrieval: embedding generation plus the external
//! similarity-search store, combined behind the [`SimilaritySearch`] seam.
//!
//! The store owns the embeddings and their on-disk layout; this side only
//! ever sees query rows of `(document, metadata, distance)` and converts
//! the distance into a similarity score.

pub mod embeddings;
pub mod store;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::RetrievalCandidate;

pub use embeddings::EmbeddingClient;
pub use store::VectorStoreClient;

/// One chunk record as written to the vector store.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Stable id: hex SHA-256 of `"{source}::{chunk_index}"`, so
    /// re-ingesting unchanged content upserts instead of duplicating.
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub title: String,
}

/// The similarity-search surface the engine depends on.
///
/// The production implementation embeds text and talks to the external
/// store over HTTP; tests substitute an in-memory scorer.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Number of entries in the backing collection.
    async fn count(&self) -> Result<usize>;

    /// Write chunk records, overwriting any existing entry with the same id.
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Similarity-scored candidates for a query, best first.
    async fn query(&self, query: &str, n_results: usize) -> Result<Vec<RetrievalCandidate>>;
}

/// Production [`SimilaritySearch`]: embeds with the configured backend and
/// queries the external store.
pub struct VectorSearcher {
    embeddings: EmbeddingClient,
    store: VectorStoreClient,
}

impl VectorSearcher {
    pub fn new(embeddings: EmbeddingClient, store: VectorStoreClient) -> Self {
        Self { embeddings, store }
    }
}

#[async_trait]
impl SimilaritySearch for VectorSearcher {
    async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embeddings.embed_batch(&texts).await?;
        self.store.upsert(records, &embeddings).await
    }

    async fn query(&self, query: &str, n_results: usize) -> Result<Vec<RetrievalCandidate>> {
        let embedding = self.embeddings.embed_query(query).await?;
        self.store.query(&embedding, n_results).await
    }
}

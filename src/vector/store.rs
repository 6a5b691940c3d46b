//! REST client for the external similarity-search store.
//!
//! Speaks a Chroma-style collection API: get-or-create, count, upsert of
//! parallel `ids`/`embeddings`/`documents`/`metadatas` arrays, and query
//! returning parallel row lists with distances. The store's on-disk layout
//! is its own concern; nothing here inspects raw embedding values.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::VectorStoreConfig;
use crate::error::{EngineError, Result};
use crate::models::RetrievalCandidate;
use crate::vector::ChunkRecord;

/// Metadata stored alongside each chunk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: Option<String>,
    pub chunk_index: Option<usize>,
    pub title: Option<String>,
}

pub struct VectorStoreClient {
    http: reqwest::Client,
    config: VectorStoreConfig,
    /// Resolved collection id, fetched once per process.
    collection_id: OnceCell<String>,
}

impl VectorStoreClient {
    pub fn new(http: reqwest::Client, config: VectorStoreConfig) -> Self {
        Self {
            http,
            config,
            collection_id: OnceCell::new(),
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/api/v1{path}",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Get-or-create the configured collection, caching its id.
    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let resp = self
                    .http
                    .post(self.url("/collections"))
                    .timeout(self.timeout())
                    .json(&json!({
                        "name": self.config.collection,
                        "get_or_create": true,
                    }))
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(EngineError::Store(format!(
                        "collection get-or-create returned {status}: {body}"
                    )));
                }

                let body: CollectionResponse = resp.json().await?;
                Ok::<String, EngineError>(body.id)
            })
            .await?;
        Ok(id)
    }

    /// Number of entries in the collection.
    pub async fn count(&self) -> Result<usize> {
        let id = self.collection_id().await?;
        let resp = self
            .http
            .get(self.url(&format!("/collections/{id}/count")))
            .timeout(self.timeout())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(EngineError::Store(format!("count returned {status}")));
        }
        Ok(resp.json().await?)
    }

    /// Upsert chunk records with their embeddings. `embeddings` must be
    /// parallel with `records`; entries with the same id are overwritten.
    pub async fn upsert(&self, records: &[ChunkRecord], embeddings: &[Vec<f32>]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if records.len() != embeddings.len() {
            return Err(EngineError::Store(format!(
                "embedding count {} does not match record count {}",
                embeddings.len(),
                records.len()
            )));
        }

        let id = self.collection_id().await?;
        let metadatas: Vec<ChunkMetadata> = records
            .iter()
            .map(|r| ChunkMetadata {
                source: Some(r.source.clone()),
                chunk_index: Some(r.chunk_index),
                title: Some(r.title.clone()),
            })
            .collect();

        let resp = self
            .http
            .post(self.url(&format!("/collections/{id}/upsert")))
            .timeout(self.timeout())
            .json(&json!({
                "ids": records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
                "embeddings": embeddings,
                "documents": records.iter().map(|r| r.text.as_str()).collect::<Vec<_>>(),
                "metadatas": metadatas,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Store(format!(
                "upsert returned {status}: {body}"
            )));
        }
        Ok(())
    }

    /// Nearest neighbours for a query embedding, best first, with the
    /// store distance converted to `score = max(0, 1 - distance)`.
    pub async fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<RetrievalCandidate>> {
        let id = self.collection_id().await?;
        let resp = self
            .http
            .post(self.url(&format!("/collections/{id}/query")))
            .timeout(self.timeout())
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": n_results,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Store(format!(
                "query returned {status}: {body}"
            )));
        }

        let body: QueryResponse = resp.json().await?;
        Ok(candidates_from_rows(body))
    }
}

/// Flatten the store's parallel row lists into candidates. Rows are kept
/// in store order (already best-first); a missing distance leaves the
/// score unset.
fn candidates_from_rows(body: QueryResponse) -> Vec<RetrievalCandidate> {
    let docs = body.documents.into_iter().next().unwrap_or_default();
    let metas = body.metadatas.into_iter().next().unwrap_or_default();
    let dists = body.distances.into_iter().next().unwrap_or_default();

    docs.into_iter()
        .enumerate()
        .map(|(i, text)| {
            let meta = metas.get(i).cloned().flatten();
            let dist = dists.get(i).copied().flatten();
            RetrievalCandidate {
                text,
                source: meta
                    .as_ref()
                    .and_then(|m| m.source.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                title: meta.and_then(|m| m.title),
                vector_score: dist.map(|d| (1.0 - d).max(0.0)),
                lexical_rank: None,
                fused_score: None,
                rerank_score: None,
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<String>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<ChunkMetadata>>>,
    #[serde(default)]
    distances: Vec<Vec<Option<f32>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(source: &str, title: &str) -> Option<ChunkMetadata> {
        Some(ChunkMetadata {
            source: Some(source.to_string()),
            chunk_index: Some(0),
            title: Some(title.to_string()),
        })
    }

    #[test]
    fn test_rows_map_to_candidates_with_clipped_scores() {
        let body = QueryResponse {
            documents: vec![vec!["near text".to_string(), "far text".to_string()]],
            metadatas: vec![vec![meta("a.md", "Alpha"), meta("b.md", "Beta")]],
            distances: vec![vec![Some(0.2), Some(1.7)]],
        };

        let candidates = candidates_from_rows(body);
        assert_eq!(candidates.len(), 2);
        assert!((candidates[0].vector_score.unwrap() - 0.8).abs() < 1e-6);
        // distances past 1.0 clip to zero rather than going negative
        assert_eq!(candidates[1].vector_score, Some(0.0));
        assert_eq!(candidates[0].source, "a.md");
        assert_eq!(candidates[0].title.as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_missing_metadata_defaults_source() {
        let body = QueryResponse {
            documents: vec![vec!["text".to_string()]],
            metadatas: vec![vec![None]],
            distances: vec![vec![None]],
        };
        let candidates = candidates_from_rows(body);
        assert_eq!(candidates[0].source, "unknown");
        assert_eq!(candidates[0].vector_score, None);
    }

    #[test]
    fn test_empty_response_yields_no_candidates() {
        assert!(candidates_from_rows(QueryResponse::default()).is_empty());
    }
}

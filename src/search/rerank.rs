//! Optional second-pass relevance scoring.
//!
//! A pairwise (query, passage) model reorders the fused candidate list. The
//! whole pass is fail-open: any scorer error leaves the candidates exactly
//! as they arrived.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::{EngineError, Result};
use crate::models::RetrievalCandidate;

/// Scores (query, passage) pairs for relevance. Returned scores are aligned
/// with the input passage order.
#[async_trait]
pub trait PairwiseScorer: Send + Sync {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;
}

/// Re-sort candidates by pairwise relevance, descending.
///
/// The relevance score is attached to each candidate; the fused score is
/// left untouched. On any scorer failure the incoming order is returned
/// unchanged.
pub async fn apply_rerank(
    scorer: &dyn PairwiseScorer,
    query: &str,
    mut candidates: Vec<RetrievalCandidate>,
) -> Vec<RetrievalCandidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let passages: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let scores = match scorer.score(query, &passages).await {
        Ok(scores) if scores.len() == candidates.len() => scores,
        Ok(scores) => {
            tracing::warn!(
                "Reranker returned {} scores for {} passages; keeping fused order",
                scores.len(),
                candidates.len()
            );
            return candidates;
        }
        Err(e) => {
            tracing::warn!("Reranking failed, keeping fused order: {e}");
            return candidates;
        }
    };

    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.rerank_score = Some(score);
    }
    candidates.sort_by(|a, b| {
        b.rerank_score
            .partial_cmp(&a.rerank_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

/// Sigmoid normalization: maps raw logits to the 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Cross-encoder sidecar speaking the `/v1/rerank` protocol.
pub struct CrossEncoderClient {
    http: reqwest::Client,
    config: RerankerConfig,
}

impl CrossEncoderClient {
    pub fn new(http: reqwest::Client, config: RerankerConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl PairwiseScorer for CrossEncoderClient {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .ok_or_else(|| EngineError::InvalidInput("reranker base_url not configured".into()))?;
        let model = self.config.model.as_deref().unwrap_or("default");
        let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

        let req_body = RerankRequest {
            model: model.to_string(),
            query: query.to_string(),
            documents: passages.to_vec(),
            top_n: passages.len(),
        };

        let timeout = std::time::Duration::from_secs(self.config.timeout_secs.min(30));
        let resp = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&req_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Store(format!(
                "reranker returned {status}: {body}"
            )));
        }

        let body: RerankResponse = resp.json().await?;

        // Responses index into the request's document array; realign and
        // squash logits into 0-1.
        let mut scores = vec![0.0f32; passages.len()];
        for item in body.results {
            if let Some(slot) = scores.get_mut(item.index) {
                *slot = sigmoid(item.relevance_score);
            }
        }
        Ok(scores)
    }
}

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer(Vec<f32>);

    #[async_trait]
    impl PairwiseScorer for FixedScorer {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl PairwiseScorer for FailingScorer {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f32>> {
            Err(EngineError::Store("model exploded".into()))
        }
    }

    fn candidate(source: &str) -> RetrievalCandidate {
        RetrievalCandidate {
            text: format!("passage from {source}"),
            source: source.to_string(),
            title: None,
            vector_score: Some(0.5),
            lexical_rank: None,
            fused_score: Some(0.02),
            rerank_score: None,
        }
    }

    #[tokio::test]
    async fn test_rerank_reorders_by_score() {
        let candidates = vec![candidate("a.md"), candidate("b.md"), candidate("c.md")];
        let scorer = FixedScorer(vec![0.1, 0.9, 0.5]);

        let ranked = apply_rerank(&scorer, "query", candidates).await;
        let sources: Vec<&str> = ranked.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["b.md", "c.md", "a.md"]);
        assert_eq!(ranked[0].rerank_score, Some(0.9));
        // fused score untouched
        assert_eq!(ranked[0].fused_score, Some(0.02));
    }

    #[tokio::test]
    async fn test_rerank_fails_open_on_error() {
        let candidates = vec![candidate("a.md"), candidate("b.md"), candidate("c.md")];
        let ranked = apply_rerank(&FailingScorer, "query", candidates).await;
        let sources: Vec<&str> = ranked.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.md", "c.md"]);
        assert!(ranked.iter().all(|c| c.rerank_score.is_none()));
    }

    #[tokio::test]
    async fn test_rerank_fails_open_on_score_count_mismatch() {
        let candidates = vec![candidate("a.md"), candidate("b.md")];
        let scorer = FixedScorer(vec![0.3]);
        let ranked = apply_rerank(&scorer, "query", candidates).await;
        let sources: Vec<&str> = ranked.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn test_rerank_empty_input() {
        let ranked = apply_rerank(&FailingScorer, "query", Vec::new()).await;
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_sigmoid_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_saturation() {
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_sigmoid_symmetry() {
        let x = 2.5f32;
        assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-6);
    }
}

use serde::{Deserialize, Serialize};

/// A document loaded from the corpus directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Source id: the path the document was loaded from.
    pub source: String,
    pub text: String,
    /// Display title derived from the content or the file stem.
    pub title: String,
}

/// A retrieval candidate flowing through fusion and reranking.
/// Constructed per query, discarded after the response is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub text: String,
    pub source: String,
    pub title: Option<String>,
    /// Similarity derived from the store's distance: `max(0, 1 - distance)`.
    pub vector_score: Option<f32>,
    /// 1-based rank in the file-level lexical result list, if the source
    /// matched any lexical hit.
    pub lexical_rank: Option<usize>,
    pub fused_score: Option<f32>,
    pub rerank_score: Option<f32>,
}

impl RetrievalCandidate {
    /// The score reported to callers: rerank score when reranking ran,
    /// else the fused score, else the raw vector similarity.
    pub fn display_score(&self) -> f32 {
        self.rerank_score
            .or(self.fused_score)
            .or(self.vector_score)
            .unwrap_or(0.0)
    }
}

/// Context-building request (the query contract).
#[derive(Debug, Clone, Deserialize)]
pub struct ContextRequest {
    pub query: String,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    #[serde(default = "default_true")]
    pub use_lexical_prefilter: bool,
    #[serde(default)]
    pub use_rerank: bool,
}

fn default_n_results() -> usize {
    6
}

fn default_true() -> bool {
    true
}

impl ContextRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            n_results: default_n_results(),
            use_lexical_prefilter: true,
            use_rerank: false,
        }
    }
}

/// One ranked source returned to the orchestration layer, with a
/// display-safe snippet attached.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredSource {
    pub text: String,
    pub source: String,
    pub title: Option<String>,
    pub score: f32,
    pub snippet: String,
}

/// Sentence-level NLI classification ratios for a verified answer.
///
/// All three ratios are in `[0, 1]`, or all equal the reserved
/// [`NliRatios::UNAVAILABLE`] sentinel when the classifier could not be
/// loaded at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NliRatios {
    pub entail_ratio: f32,
    pub neutral_ratio: f32,
    pub contradict_ratio: f32,
}

impl NliRatios {
    pub const UNAVAILABLE: f32 = -1.0;

    pub fn unavailable() -> Self {
        Self {
            entail_ratio: Self::UNAVAILABLE,
            neutral_ratio: Self::UNAVAILABLE,
            contradict_ratio: Self::UNAVAILABLE,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.entail_ratio < 0.0
    }
}

/// A generated answer after the faithfulness check.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedAnswer {
    pub answer: String,
    pub ratios: NliRatios,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_request_defaults() {
        let req: ContextRequest = serde_json::from_str(r#"{"query": "hello"}"#).unwrap();
        assert_eq!(req.n_results, 6);
        assert!(req.use_lexical_prefilter);
        assert!(!req.use_rerank);
    }

    #[test]
    fn test_display_score_prefers_rerank() {
        let mut c = RetrievalCandidate {
            text: String::new(),
            source: "a.md".to_string(),
            title: None,
            vector_score: Some(0.4),
            lexical_rank: None,
            fused_score: Some(0.03),
            rerank_score: None,
        };
        assert!((c.display_score() - 0.03).abs() < 1e-6);
        c.rerank_score = Some(0.9);
        assert!((c.display_score() - 0.9).abs() < 1e-6);
        c.rerank_score = None;
        c.fused_score = None;
        assert!((c.display_score() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_unavailable_ratios_sentinel() {
        let r = NliRatios::unavailable();
        assert!(r.is_unavailable());
        let ok = NliRatios {
            entail_ratio: 1.0,
            neutral_ratio: 0.0,
            contradict_ratio: 0.0,
        };
        assert!(!ok.is_unavailable());
    }
}

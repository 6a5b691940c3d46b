//! Reciprocal Rank Fusion of the lexical and vector signals.
//!
//! The vector side has no true rank list of its own here (candidates arrive
//! already ordered by similarity), so each similarity score is mapped to a
//! pseudo-rank before fusing. The lexical side contributes the file-level
//! rank of the candidate's source, when the source matched any lexical hit.

use std::collections::HashMap;

use crate::models::RetrievalCandidate;

/// RRF smoothing constant.
pub const RRF_K: f64 = 60.0;

/// Map a similarity score in `[0, 1]` to an integer pseudo-rank:
/// `max(1, floor(100 × (1 − score)))`. Higher similarity → lower (better)
/// rank.
pub fn vector_pseudo_rank(score: f32) -> usize {
    let raw = (100.0 * (1.0 - score as f64)).floor();
    if raw < 1.0 {
        1
    } else {
        raw as usize
    }
}

/// RRF contribution sum for a candidate's ranks.
pub fn fused_score_from_ranks(vector_rank: usize, lexical_rank: Option<usize>) -> f64 {
    let mut score = 1.0 / (RRF_K + vector_rank as f64);
    if let Some(rank) = lexical_rank {
        score += 1.0 / (RRF_K + rank as f64);
    }
    score
}

/// Attach fused scores and reorder candidates by them, descending.
///
/// `file_ranks` is the file-level lexical rank map keyed by source path.
/// Ties keep the incoming (vector-retrieval) relative order.
pub fn rrf_fuse(candidates: &mut [RetrievalCandidate], file_ranks: &HashMap<String, usize>) {
    for candidate in candidates.iter_mut() {
        let vec_rank = vector_pseudo_rank(candidate.vector_score.unwrap_or(0.0));
        let lex_rank = file_ranks.get(&candidate.source).copied();
        candidate.lexical_rank = lex_rank;
        candidate.fused_score = Some(fused_score_from_ranks(vec_rank, lex_rank) as f32);
    }

    candidates.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Restrict candidates to sources matching the lexical prefilter list
/// (full path equality or suffix match). An empty filtered result falls
/// back to the unfiltered candidate set rather than returning nothing.
pub fn apply_prefilter(
    candidates: Vec<RetrievalCandidate>,
    allowed: &[String],
) -> Vec<RetrievalCandidate> {
    if allowed.is_empty() {
        return candidates;
    }

    let filtered: Vec<RetrievalCandidate> = candidates
        .iter()
        .filter(|c| {
            allowed
                .iter()
                .any(|p| c.source == *p || c.source.ends_with(p))
        })
        .cloned()
        .collect();

    if filtered.is_empty() {
        tracing::debug!("Lexical prefilter matched nothing; keeping unfiltered candidates");
        candidates
    } else {
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, vector_score: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            text: format!("text of {source}"),
            source: source.to_string(),
            title: None,
            vector_score: Some(vector_score),
            lexical_rank: None,
            fused_score: None,
            rerank_score: None,
        }
    }

    #[test]
    fn test_pseudo_rank_mapping() {
        assert_eq!(vector_pseudo_rank(1.0), 1); // perfect similarity
        assert_eq!(vector_pseudo_rank(0.5), 50);
        assert_eq!(vector_pseudo_rank(0.0), 100);
        // clipped scores above 1 still map to the best rank
        assert_eq!(vector_pseudo_rank(1.5), 1);
    }

    #[test]
    fn test_fused_score_known_values() {
        // lexical 1 + vector 3 vs lexical 5 + vector 1
        let a = fused_score_from_ranks(3, Some(1));
        let b = fused_score_from_ranks(1, Some(5));
        assert!((a - 0.0322).abs() < 1e-3);
        assert!((b - 0.0318).abs() < 1e-3);
        assert!(a > b);
    }

    #[test]
    fn test_vector_only_term_when_no_lexical_rank() {
        let score = fused_score_from_ranks(10, None);
        assert!((score - 1.0 / 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_fuse_orders_by_combined_signal() {
        // a: strong lexical, middling vector; b: no lexical, best vector
        let mut candidates = vec![candidate("b.md", 0.99), candidate("a.md", 0.97)];
        let mut ranks = HashMap::new();
        ranks.insert("a.md".to_string(), 1usize);

        rrf_fuse(&mut candidates, &ranks);
        assert_eq!(candidates[0].source, "a.md");
        assert_eq!(candidates[0].lexical_rank, Some(1));
        assert_eq!(candidates[1].lexical_rank, None);
        assert!(candidates[0].fused_score.unwrap() > candidates[1].fused_score.unwrap());
    }

    #[test]
    fn test_fuse_ties_keep_vector_order() {
        // identical scores, no lexical signal: stable sort keeps input order
        let mut candidates = vec![
            candidate("first.md", 0.8),
            candidate("second.md", 0.8),
            candidate("third.md", 0.8),
        ];
        rrf_fuse(&mut candidates, &HashMap::new());
        let sources: Vec<&str> = candidates.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec!["first.md", "second.md", "third.md"]);
    }

    #[test]
    fn test_prefilter_suffix_match() {
        let candidates = vec![candidate("data/a.md", 0.9), candidate("data/b.md", 0.8)];
        let allowed = vec!["a.md".to_string()];
        let filtered = apply_prefilter(candidates, &allowed);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].source, "data/a.md");
    }

    #[test]
    fn test_prefilter_falls_back_when_nothing_matches() {
        let candidates = vec![candidate("data/a.md", 0.9), candidate("data/b.md", 0.8)];
        let allowed = vec!["unrelated.md".to_string()];
        let filtered = apply_prefilter(candidates.clone(), &allowed);
        assert_eq!(filtered.len(), candidates.len());
    }

    #[test]
    fn test_prefilter_empty_allowlist_is_noop() {
        let candidates = vec![candidate("data/a.md", 0.9)];
        let filtered = apply_prefilter(candidates.clone(), &[]);
        assert_eq!(filtered.len(), 1);
    }
}

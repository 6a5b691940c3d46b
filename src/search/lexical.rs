//! In-memory BM25 index over token multisets.
//!
//! Two instances exist at runtime: one keyed by source path over whole
//! documents, one keyed by `"{source}::{chunk_index}"` over chunks. Both are
//! rebuilt wholesale from the corpus rather than patched incrementally, and
//! cached behind [`LazyIndex`] until an explicit invalidation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Lowercase, split on any run of characters outside `[a-z0-9_]`, drop
/// empties. Non-ASCII characters act as separators.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

struct IndexedEntry {
    key: String,
    len: usize,
    tf: HashMap<String, usize>,
}

/// BM25 index over `(key, text)` pairs.
pub struct LexicalIndex {
    entries: Vec<IndexedEntry>,
    df: HashMap<String, usize>,
    avg_len: f64,
}

impl LexicalIndex {
    pub fn build<K, T>(items: impl IntoIterator<Item = (K, T)>) -> Self
    where
        K: Into<String>,
        T: AsRef<str>,
    {
        let mut entries = Vec::new();
        let mut df: HashMap<String, usize> = HashMap::new();

        for (key, text) in items {
            let tokens = tokenize(text.as_ref());
            let len = tokens.len();
            let mut tf: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
            entries.push(IndexedEntry {
                key: key.into(),
                len,
                tf,
            });
        }

        let total: usize = entries.iter().map(|e| e.len).sum();
        let avg_len = if entries.is_empty() {
            0.0
        } else {
            total as f64 / entries.len() as f64
        };

        Self {
            entries,
            df,
            avg_len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.entries.len() as f64;
        let df = self.df.get(term).copied().unwrap_or(0) as f64;
        if df == 0.0 {
            return 0.0;
        }
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn score(&self, query_terms: &[String], entry: &IndexedEntry) -> f64 {
        if self.avg_len == 0.0 {
            return 0.0;
        }
        let mut score = 0.0;
        for term in query_terms {
            let tf = entry.tf.get(term).copied().unwrap_or(0) as f64;
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf(term);
            let norm = tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * entry.len as f64 / self.avg_len));
            score += idf * norm;
        }
        score
    }

    /// Keys ranked by descending BM25 score. Only entries with score > 0 are
    /// eligible; ties keep build order (stable sort).
    pub fn ranked(&self, query: &str) -> Vec<(String, f64)> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|e| (e.key.clone(), self.score(&terms, e)))
            .filter(|(_, s)| *s > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    /// `{key → 1-based rank}` over the positive-score result list.
    pub fn rank_map(&self, query: &str) -> HashMap<String, usize> {
        self.ranked(query)
            .into_iter()
            .enumerate()
            .map(|(i, (key, _))| (key, i + 1))
            .collect()
    }

    /// The best `n` keys for the query (the lexical-prefilter file list).
    pub fn top_keys(&self, query: &str, n: usize) -> Vec<String> {
        self.ranked(query)
            .into_iter()
            .take(n)
            .map(|(key, _)| key)
            .collect()
    }
}

/// Process-wide lazily-built index slot.
///
/// The double-checked write lock guarantees a single build under concurrent
/// first queries. Invalidation is explicit: queries never rebuild a cached
/// index on their own, the caller decides when freshness matters.
pub struct LazyIndex {
    slot: RwLock<Option<Arc<LexicalIndex>>>,
}

impl Default for LazyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyIndex {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub fn get_or_build(&self, build: impl FnOnce() -> LexicalIndex) -> Arc<LexicalIndex> {
        if let Some(index) = self.slot.read().as_ref() {
            return Arc::clone(index);
        }
        let mut slot = self.slot.write();
        if let Some(index) = slot.as_ref() {
            return Arc::clone(index);
        }
        let index = Arc::new(build());
        *slot = Some(Arc::clone(&index));
        index
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

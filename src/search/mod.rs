//! Retrieval signals and their combination: BM25 lexical scoring, RRF
//! fusion, and the optional cross-encoder rerank pass.

pub mod fusion;
pub mod lexical;
pub mod rerank;

//! # doc-search
//!
//! A hybrid retrieval-fusion and answer-faithfulness engine for question
//! answering over a private document corpus.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌─────────────┐
//!                       │  User Query  │
//!                       └──────┬───────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!      ┌─────────────────┐          ┌──────────────────┐
//!      │  BM25 (files)   │          │ Vector Retriever │
//!      │ prefilter+ranks │          │  embed + query   │
//!      └────────┬────────┘          └────────┬─────────┘
//!               │                            │
//!               └─────────────┬──────────────┘
//!                             ▼
//!                ┌────────────────────────┐
//!                │  RRF Fusion (k = 60)   │
//!                │  vector pseudo-rank +  │
//!                │  file-level BM25 rank  │
//!                └───────────┬────────────┘
//!                            ▼
//!                ┌────────────────────────┐
//!                │ Cross-encoder rerank   │
//!                │ (optional, fail-open)  │
//!                └───────────┬────────────┘
//!                            ▼
//!                ┌────────────────────────┐
//!                │ Top-k + display        │
//!                │ snippets               │
//!                └────────────────────────┘
//! ```
//!
//! Separately, once an external generator has produced an answer from the
//! retrieved context, [`engine::RetrievalEngine::verify_answer`] classifies
//! each answer sentence against the context with a three-way NLI model and
//! removes contradicted sentences (fail-open).
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for corpus, chunking, and sidecars
//! - [`models`] - Shared data types: `Document`, `Chunk`, candidates, request/response types
//! - [`chunking`] - Overlapping fixed-size window chunking with stable chunk ids
//! - [`corpus`] - Corpus directory scanning, title extraction, content hashing
//! - [`indexer`] - Incremental index state and change planning
//! - [`search::lexical`] - In-memory BM25 index at file and chunk granularity
//! - [`search::fusion`] - Reciprocal Rank Fusion of the lexical and vector signals
//! - [`search::rerank`] - Cross-encoder sidecar client and fail-open rerank pass
//! - [`vector`] - Embedding backends and the external similarity-search store
//! - [`snippet`] - Display-safe excerpt extraction
//! - [`verify`] - Sentence-level NLI faithfulness verification
//! - [`engine`] - The shared engine tying the pipeline together

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod models;
pub mod search;
pub mod snippet;
pub mod vector;
pub mod verify;

pub use config::Config;
pub use engine::RetrievalEngine;
pub use error::{EngineError, Result};
pub use models::{ContextRequest, Document, ScoredSource, VerifiedAnswer};

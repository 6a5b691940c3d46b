use thiserror::Error;

/// Errors surfaced by the retrieval engine.
///
/// Only hard failures live here: the vector store being unreachable, broken
/// persistence, malformed wire payloads. Fail-open collaborators (reranker,
/// NLI classifier, embeddings on the query path) never produce an
/// `EngineError` for the caller; their failures are logged at the boundary
/// and the previous stage's output passes through.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The vector store rejected or failed a request.
    #[error("vector store error: {0}")]
    Store(String),

    /// The embedding backend failed while indexing (query-path embedding
    /// failures are fail-open and never raised).
    #[error("embedding backend error: {0}")]
    Embedding(String),

    /// The caller handed us something unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the corpus documents (.txt / .md)
    pub corpus_dir: PathBuf,
    /// Where the incremental index state snapshot is persisted
    pub data_dir: PathBuf,
    /// Chunking window size in characters
    pub chunk_max_chars: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// How many top lexical files the prefilter keeps
    pub prefilter_top_files: usize,
    /// Embedding backend configuration
    pub embedding: EmbeddingConfig,
    /// Vector store configuration
    pub store: VectorStoreConfig,
    /// Cross-encoder reranker sidecar configuration
    pub reranker: RerankerConfig,
    /// NLI classifier sidecar configuration
    pub nli: NliConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama" or "openai"
    pub provider: String,
    pub base_url: String,
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Base URL of the similarity-search service
    pub base_url: String,
    /// Collection the corpus chunks live in
    pub collection: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Configuration for the cross-encoder reranker sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the rerank API. If None, reranking is unavailable and
    /// candidates keep their fused order.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

/// Configuration for the NLI classification sidecar used by the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NliConfig {
    /// Base URL for the classify API. If None, verification is a no-op.
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("./data"),
            data_dir: PathBuf::from("./data"),
            chunk_max_chars: 1200,
            chunk_overlap: 200,
            prefilter_top_files: 50,
            embedding: EmbeddingConfig::default(),
            store: VectorStoreConfig::default(),
            reranker: RerankerConfig::default(),
            nli: NliConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            collection: "corpus_main".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Default for NliConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOC_SEARCH_CORPUS_DIR") {
            config.corpus_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DOC_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("DOC_SEARCH_CHUNK_MAX_CHARS") {
            if let Ok(v) = val.parse() {
                config.chunk_max_chars = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_SEARCH_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunk_overlap = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_SEARCH_PREFILTER_TOP_FILES") {
            if let Ok(v) = val.parse() {
                config.prefilter_top_files = v;
            }
        }

        if let Ok(provider) = std::env::var("EMBEDDINGS_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDINGS_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDINGS_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDINGS_API_KEY") {
            config.embedding.api_key = Some(key);
        }

        if let Ok(url) = std::env::var("VECTOR_STORE_BASE_URL") {
            config.store.base_url = url;
        }
        if let Ok(name) = std::env::var("VECTOR_STORE_COLLECTION") {
            config.store.collection = name;
        }
        if let Ok(val) = std::env::var("VECTOR_STORE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.store.timeout_secs = v;
            }
        }

        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Ok(val) = std::env::var("RERANKER_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.reranker.timeout_secs = v.min(30); // Cap at 30s
            }
        }

        if let Ok(url) = std::env::var("NLI_BASE_URL") {
            config.nli.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("NLI_MODEL") {
            config.nli.model = Some(model);
        }
        if let Ok(val) = std::env::var("NLI_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.nli.timeout_secs = v.min(30);
            }
        }

        // Overlap must leave room for the window to advance
        if config.chunk_max_chars == 0 {
            config.chunk_max_chars = 1200;
        }
        if config.chunk_overlap >= config.chunk_max_chars {
            config.chunk_overlap = config.chunk_max_chars - 1;
        }

        config
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(".index_state.json")
    }
}

//! Embedding generation via the configured backend.
//!
//! Supports Ollama's `/api/embed` and OpenAI-compatible `/v1/embeddings`
//! APIs, batching requests and truncating oversized inputs.

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::error::{EngineError, Result};

/// Maximum characters to send per text to the embedding API. Embedding
/// models have a bounded token context; prose tokenises at roughly one
/// token per 3-4 chars, so 3 000 chars stays safely inside an 8 192-token
/// window even for dense content.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char
/// boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Client for the embedding backend.
///
/// All failures map to [`EngineError::Embedding`] so the query path can
/// distinguish them from store failures and degrade instead of erroring.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(http: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self { http, config }
    }

    /// Generate embeddings for a batch of texts.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        match self.config.provider.as_str() {
            "ollama" => self.embed_ollama(&truncated).await,
            "openai" => self.embed_openai(&truncated).await,
            other => Err(EngineError::InvalidInput(format!(
                "unknown embedding provider: {other}"
            ))),
        }
    }

    /// Generate the embedding for a single query text.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Embedding("no embedding returned".into()))
    }

    // ─── Ollama ──────────────────────────────────────────────

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.base_url.trim_end_matches('/'));

        // Ollama supports batch embedding with the /api/embed endpoint
        let batch_size = 32;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = OllamaEmbedRequest {
                model: self.config.model.clone(),
                input: chunk.to_vec(),
                truncate: true,
            };

            let resp = self
                .http
                .post(&url)
                .json(&req)
                .send()
                .await
                .map_err(|e| EngineError::Embedding(format!("ollama embed call failed: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(EngineError::Embedding(format!(
                    "ollama embed API returned {status}: {body}"
                )));
            }

            let body: OllamaEmbedResponse = resp
                .json()
                .await
                .map_err(|e| EngineError::Embedding(format!("bad ollama embed response: {e}")))?;

            all_embeddings.extend(body.embeddings);
        }

        Ok(all_embeddings)
    }

    // ─── OpenAI-compatible ───────────────────────────────────

    async fn embed_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.config.base_url.trim_end_matches('/'));
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let batch_size = 64;
        let mut all_embeddings = Vec::new();

        for chunk in texts.chunks(batch_size) {
            let req = OpenAiEmbedRequest {
                model: self.config.model.clone(),
                input: chunk.to_vec(),
            };

            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&req)
                .send()
                .await
                .map_err(|e| EngineError::Embedding(format!("openai embed call failed: {e}")))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(EngineError::Embedding(format!(
                    "openai embed API returned {status}: {body}"
                )));
            }

            let body: OpenAiEmbedResponse = resp
                .json()
                .await
                .map_err(|e| EngineError::Embedding(format!("bad openai embed response: {e}")))?;

            let mut embeddings: Vec<Vec<f32>> =
                body.data.into_iter().map(|d| d.embedding).collect();
            all_embeddings.append(&mut embeddings);
        }

        Ok(all_embeddings)
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's
    /// context length instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

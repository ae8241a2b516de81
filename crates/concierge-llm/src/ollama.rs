use concierge_core::error::{ConciergeError, Result};
use reqwest::Client;
use serde_json::json;

use crate::provider::{parse_vector, read_body, EmbeddingProvider};

/// Ollama local embedding provider.
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding provider.
    ///
    /// # Arguments
    /// * `base_url` - Ollama server URL (e.g. "http://localhost:11434")
    /// * `model` - Embedding model identifier (e.g. "nomic-embed-text")
    /// * `dims` - Expected embedding dimensionality (e.g. 768)
    pub fn new(base_url: String, model: String, dims: usize) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
            dims,
        }
    }
}

impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ConciergeError::ModelUnavailable(format!("ollama request failed: {e}")))?;

        let response_text = read_body(response, "ollama").await?;
        parse_response(&response_text)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

fn parse_response(response_text: &str) -> Result<Vec<Vec<f32>>> {
    let parsed: serde_json::Value = serde_json::from_str(response_text).map_err(|e| {
        ConciergeError::ModelUnavailable(format!("ollama failed to parse response JSON: {e}"))
    })?;

    parsed["embeddings"]
        .as_array()
        .ok_or_else(|| {
            ConciergeError::ModelUnavailable(
                "missing embeddings array in ollama response".to_string(),
            )
        })?
        .iter()
        .map(|item| parse_vector(item, "ollama"))
        .collect()
}

use concierge_core::error::{ConciergeError, Result};
use reqwest::Client;
use serde_json::json;

use crate::provider::{parse_vector, read_body, EmbeddingProvider};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI embedding provider.
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Embedding model identifier (e.g. "text-embedding-3-small")
    /// * `dims` - Expected embedding dimensionality (e.g. 1536)
    pub fn new(api_key: String, model: String, dims: usize) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            dims,
        }
    }
}

impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(OPENAI_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ConciergeError::ModelUnavailable(format!("openai request failed: {e}")))?;

        let response_text = read_body(response, "openai").await?;
        parse_response(&response_text)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Parse an `/v1/embeddings` body. Vectors are returned in `index` order.
fn parse_response(response_text: &str) -> Result<Vec<Vec<f32>>> {
    let parsed: serde_json::Value = serde_json::from_str(response_text).map_err(|e| {
        ConciergeError::ModelUnavailable(format!("openai failed to parse response JSON: {e}"))
    })?;

    let data = parsed["data"].as_array().ok_or_else(|| {
        ConciergeError::ModelUnavailable("missing data array in openai response".to_string())
    })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        indexed.push((index, parse_vector(&item["embedding"], "openai")?));
    }
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

use std::sync::Arc;

use concierge_core::error::{ConciergeError, Result};

/// Trait for text embedding providers.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one or more text strings, returning one vector per input, in order.
    fn embed(&self, texts: &[&str]) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;

    /// Return the provider name (e.g. "openai", "ollama").
    fn name(&self) -> &str;
}

/// Lets callers share one provider between the index and other owners.
impl<T: EmbeddingProvider> EmbeddingProvider for Arc<T> {
    fn embed(&self, texts: &[&str]) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send {
        (**self).embed(texts)
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Convert a JSON array of numbers into an embedding vector.
pub(crate) fn parse_vector(value: &serde_json::Value, provider: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| {
            ConciergeError::ModelUnavailable(format!("{provider}: expected array for embedding"))
        })?
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                ConciergeError::ModelUnavailable(format!(
                    "{provider}: non-numeric value in embedding array"
                ))
            })
        })
        .collect()
}

/// Turn an HTTP response into its body text. A non-2xx status means the model
/// could not serve the request and is reported as `ModelUnavailable`.
pub(crate) async fn read_body(response: reqwest::Response, provider: &str) -> Result<String> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| {
        ConciergeError::ModelUnavailable(format!("{provider} failed to read response body: {e}"))
    })?;
    check_status(status, body, provider)
}

fn check_status(status: u16, body: String, provider: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        return Err(ConciergeError::ModelUnavailable(format!(
            "{provider} http {status}: {body}"
        )));
    }
    Ok(body)
}

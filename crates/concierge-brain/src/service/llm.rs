use concierge_core::config::Config;
use concierge_core::error::{ConciergeError, Result};
use concierge_llm::ollama::OllamaEmbedding;
use concierge_llm::openai::OpenAiEmbedding;
use concierge_llm::provider::EmbeddingProvider;
use tracing::{debug, warn};

enum Backend {
    OpenAi(OpenAiEmbedding),
    Ollama(OllamaEmbedding),
}

/// Encapsulates embedding provider dispatch.
///
/// The provider is chosen once from `[embedding].provider`; an unknown name is
/// a startup error rather than a per-request one.
pub struct Embedder {
    backend: Backend,
    model: String,
}

impl Embedder {
    pub fn new(config: &Config) -> Result<Self> {
        let embedding = &config.embedding;
        let backend = match embedding.provider.as_str() {
            "openai" => Backend::OpenAi(OpenAiEmbedding::new(
                embedding.api_key.clone(),
                embedding.model.clone(),
                embedding.dimensions,
            )),
            "ollama" => Backend::Ollama(OllamaEmbedding::new(
                config.ollama.base_url.clone(),
                embedding.model.clone(),
                embedding.dimensions,
            )),
            other => {
                return Err(ConciergeError::Config(format!(
                    "unknown embedding provider: '{other}'. Supported: openai, ollama"
                )))
            }
        };
        Ok(Self {
            backend,
            model: embedding.model.clone(),
        })
    }

    async fn embed_inner(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            Backend::OpenAi(provider) => provider.embed(texts).await,
            Backend::Ollama(provider) => provider.embed(texts).await,
        }
    }
}

impl EmbeddingProvider for Embedder {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!("[embed] calling {}/{} for {} text(s)", self.name(), self.model, texts.len());
        let result = self.embed_inner(texts).await;
        match &result {
            Ok(vecs) => {
                let dims = vecs.first().map(|v| v.len()).unwrap_or(0);
                if dims != self.dimensions() {
                    warn!("[embed] got {dims} dims, configured {}", self.dimensions());
                }
                debug!("[embed] OK, {} vector(s) x {dims} dims", vecs.len());
            }
            Err(e) => warn!("[embed] ERROR: {e}"),
        }
        result
    }

    fn dimensions(&self) -> usize {
        match &self.backend {
            Backend::OpenAi(provider) => provider.dimensions(),
            Backend::Ollama(provider) => provider.dimensions(),
        }
    }

    fn name(&self) -> &str {
        match &self.backend {
            Backend::OpenAi(provider) => provider.name(),
            Backend::Ollama(provider) => provider.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_configured_provider() {
        let mut config = Config::default();
        config.embedding.provider = "openai".to_string();
        config.embedding.dimensions = 1536;
        let embedder = Embedder::new(&config).unwrap();
        assert_eq!(embedder.name(), "openai");
        assert_eq!(embedder.dimensions(), 1536);
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let mut config = Config::default();
        config.embedding.provider = "word2vec".to_string();
        let err = Embedder::new(&config).err().unwrap();
        assert!(matches!(err, ConciergeError::Config(_)));
    }
}

use concierge_core::error::{ConciergeError, Result};
use concierge_core::types::QaPair;
use concierge_llm::provider::EmbeddingProvider;
use tracing::info;

/// A corpus question with its answer and precomputed embedding.
#[derive(Debug, Clone)]
pub struct QaEntry {
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
}

/// The fixed question corpus and its embeddings, in corpus order.
///
/// Built once at startup and read-only afterwards. Positions are the stable
/// identifiers the ranker works with; the index is never empty.
pub struct EmbeddingIndex<E> {
    embedder: E,
    entries: Vec<QaEntry>,
}

impl<E: EmbeddingProvider> EmbeddingIndex<E> {
    /// Embed every question of the corpus, `batch_size` questions per request.
    pub async fn build(embedder: E, pairs: Vec<QaPair>, batch_size: usize) -> Result<Self> {
        if pairs.is_empty() {
            return Err(ConciergeError::EmptyIndex);
        }

        let mut entries = Vec::with_capacity(pairs.len());
        for batch in pairs.chunks(batch_size.max(1)) {
            let questions: Vec<&str> = batch.iter().map(|p| p.question.as_str()).collect();
            let vectors = embedder.embed(&questions).await?;
            if vectors.len() != batch.len() {
                return Err(ConciergeError::ModelUnavailable(format!(
                    "{} returned {} vectors for {} questions",
                    embedder.name(),
                    vectors.len(),
                    batch.len()
                )));
            }
            entries.extend(batch.iter().zip(vectors).map(|(pair, embedding)| QaEntry {
                question: pair.question.clone(),
                answer: pair.answer.clone(),
                embedding,
            }));
        }

        info!(
            "[index] embedded {} question(s) with {}",
            entries.len(),
            embedder.name()
        );
        Self::from_entries(embedder, entries)
    }

    /// Wrap entries whose embeddings were computed elsewhere.
    pub fn from_entries(embedder: E, entries: Vec<QaEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(ConciergeError::EmptyIndex);
        }
        let dims = entries[0].embedding.len();
        if let Some(bad) = entries.iter().position(|e| e.embedding.len() != dims) {
            return Err(ConciergeError::ModelUnavailable(format!(
                "embedding {bad} has {} dims, expected {dims}",
                entries[bad].embedding.len()
            )));
        }
        Ok(Self { embedder, entries })
    }

    /// Embed a single text with the same model the corpus was embedded with.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ConciergeError::ModelUnavailable(format!(
                    "{} returned no vector",
                    self.embedder.name()
                ))
            })
    }
}

impl<E> EmbeddingIndex<E> {
    /// One embedding per entry, in corpus order.
    pub fn all_question_embeddings(&self) -> impl ExactSizeIterator<Item = &[f32]> {
        self.entries.iter().map(|e| e.embedding.as_slice())
    }

    pub fn entry(&self, index: usize) -> Option<&QaEntry> {
        self.entries.get(index)
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.entry(index).map(|e| e.answer.as_str())
    }

    /// Length of every corpus embedding.
    pub fn dimensions(&self) -> usize {
        self.entries.first().map_or(0, |e| e.embedding.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

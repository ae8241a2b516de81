use std::sync::Arc;

use concierge_core::config::RankingConfig;
use concierge_core::error::{ConciergeError, Result};
use concierge_llm::provider::EmbeddingProvider;
use tracing::debug;

use super::index::{EmbeddingIndex, QaEntry};

/// Cosine similarity between two vectors.
///
/// Zero, empty or mismatched vectors score 0 instead of dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, aa, bb), (x, y)| {
            (d + x * y, aa + x * x, bb + y * y)
        });

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let score = dot / (na.sqrt() * nb.sqrt());
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Score `candidates` against `query` and keep the best `k`, highest first.
/// The sort is stable, so equal scores keep candidate order.
fn top_k<'a>(
    query: &[f32],
    candidates: impl Iterator<Item = (usize, &'a [f32])>,
    k: usize,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .map(|(i, embedding)| (i, cosine_similarity(query, embedding)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

/// The winning corpus entry for a query.
#[derive(Debug)]
pub struct RankedMatch<'a> {
    pub index: usize,
    pub score: f32,
    pub entry: &'a QaEntry,
}

/// Two-pass answer selection over an [`EmbeddingIndex`].
///
/// Pass one scores the whole corpus and keeps the best `candidates`; pass two
/// rescores only those against a second embedding of the query and takes the
/// leader.
pub struct MatchRanker<E> {
    index: Arc<EmbeddingIndex<E>>,
    candidates: usize,
    reuse_query_embedding: bool,
}

impl<E: EmbeddingProvider> MatchRanker<E> {
    pub fn new(index: Arc<EmbeddingIndex<E>>, config: &RankingConfig) -> Self {
        Self {
            index,
            candidates: config.candidates.max(1),
            reuse_query_embedding: config.reuse_query_embedding,
        }
    }

    pub fn index(&self) -> &EmbeddingIndex<E> {
        &self.index
    }

    /// Answer text of the best match for `query`.
    pub async fn rank(&self, query: &str) -> Result<String> {
        Ok(self.rank_match(query).await?.entry.answer.clone())
    }

    /// Embed `query`, rejecting vectors that cannot be compared with the corpus.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let embedding = self.index.embed(query).await?;
        let expected = self.index.dimensions();
        if embedding.len() != expected {
            return Err(ConciergeError::ModelUnavailable(format!(
                "query embedding has {} dims, corpus has {expected}",
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    pub async fn rank_match(&self, query: &str) -> Result<RankedMatch<'_>> {
        if self.index.is_empty() {
            return Err(ConciergeError::EmptyIndex);
        }

        let query_embedding = self.embed_query(query).await?;
        let shortlist = top_k(
            &query_embedding,
            self.index.all_question_embeddings().enumerate(),
            self.candidates,
        );

        let second_embedding = if self.reuse_query_embedding {
            query_embedding
        } else {
            self.embed_query(query).await?
        };

        // Positions in `rescored` refer to `shortlist`, not to the corpus.
        let rescored = top_k(
            &second_embedding,
            shortlist.iter().enumerate().map(|(pos, (corpus_idx, _))| {
                let embedding = self
                    .index
                    .entry(*corpus_idx)
                    .map(|e| e.embedding.as_slice())
                    .unwrap_or_default();
                (pos, embedding)
            }),
            self.candidates,
        );

        let (position, score) = *rescored.first().ok_or(ConciergeError::EmptyIndex)?;
        let index = shortlist[position].0;
        let entry = self.index.entry(index).ok_or(ConciergeError::EmptyIndex)?;

        debug!(
            "[rank] shortlist={:?} winner={index} score={score:.3}",
            shortlist.iter().map(|(i, _)| *i).collect::<Vec<_>>()
        );
        Ok(RankedMatch { index, score, entry })
    }
}

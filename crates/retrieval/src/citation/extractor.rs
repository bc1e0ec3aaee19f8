use super::scanner::distinct_markers;
use super::Citation;
use crate::embeddings::EmbeddingProvider;
use crate::store::cosine_similarity;
use crate::types::RetrievedItem;
use mosaic_core::config::CitationConfig;
use mosaic_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How an answer is attributed, decided once per response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// The answer carries `[n]` markers; the distinct numbers, ascending.
    Explicit(BTreeSet<u32>),
    /// No markers: attribute by semantic similarity.
    Implicit,
}

impl Attribution {
    pub fn detect(answer: &str) -> Self {
        let numbers = distinct_markers(answer);
        if numbers.is_empty() {
            Attribution::Implicit
        } else {
            Attribution::Explicit(numbers)
        }
    }
}

/// Maps an answer back to the ranked items it relies on.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    embedder: Arc<dyn EmbeddingProvider>,
    config: CitationConfig,
    timeout: Duration,
}

impl CitationExtractor {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: CitationConfig, timeout: Duration) -> Self {
        Self {
            embedder,
            config,
            timeout,
        }
    }

    /// Citations sorted by number. Never fails: any extraction error or
    /// timeout is logged and yields an empty list.
    pub async fn extract(&self, answer: &str, ranked: &[RetrievedItem]) -> Vec<Citation> {
        match tokio::time::timeout(self.timeout, self.try_extract(answer, ranked)).await {
            Ok(Ok(citations)) => citations,
            Ok(Err(e)) => {
                warn!(error = %e, "Citation extraction failed; returning no citations");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Citation extraction timed out; returning no citations"
                );
                Vec::new()
            }
        }
    }

    /// Same as [`extract`](Self::extract) but surfaces the failure.
    pub async fn try_extract(&self, answer: &str, ranked: &[RetrievedItem]) -> AppResult<Vec<Citation>> {
        let mut citations = match Attribution::detect(answer) {
            Attribution::Explicit(numbers) => explicit(&numbers, ranked),
            Attribution::Implicit if ranked.is_empty() => Vec::new(),
            Attribution::Implicit => self.implicit(answer, ranked).await?,
        };
        citations.sort_by_key(|citation| citation.number);
        debug!(count = citations.len(), "Extracted citations");
        Ok(citations)
    }

    async fn implicit(&self, answer: &str, ranked: &[RetrievedItem]) -> AppResult<Vec<Citation>> {
        let pool = &ranked[..ranked.len().min(self.config.candidate_pool)];

        let mut texts = Vec::with_capacity(pool.len() + 1);
        texts.push(answer.to_string());
        texts.extend(pool.iter().map(|item| item.content.clone()));

        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Extraction(format!(
                "Embedder returned {} vectors for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        let (answer_vector, item_vectors) = embeddings
            .split_first()
            .ok_or_else(|| AppError::Extraction("No answer embedding".to_string()))?;

        let mut scored: Vec<(usize, f32)> = item_vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| (index, cosine_similarity(answer_vector, vector)))
            .filter(|(_, similarity)| {
                similarity.is_finite() && *similarity > self.config.similarity_threshold
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.max_implicit);

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(position, (index, _))| {
                Citation::from_item(position as u32 + 1, index + 1, &pool[index])
            })
            .collect())
    }
}

/// One citation per in-range marker number. Out-of-range numbers are
/// dropped; a marker set that is entirely out of range yields nothing.
fn explicit(numbers: &BTreeSet<u32>, ranked: &[RetrievedItem]) -> Vec<Citation> {
    numbers
        .iter()
        .filter_map(|&number| {
            let rank = number as usize;
            let item = ranked.get(rank.checked_sub(1)?)?;
            Some(Citation::from_item(number, rank, item))
        })
        .collect()
}

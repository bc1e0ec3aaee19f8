//! Fan-out search across modality stores.
//!
//! Each enabled modality is queried independently and concurrently, every
//! query bounded by the retriever's timeout. A modality whose embedding,
//! query or deadline fails contributes nothing and is logged; it never
//! fails the request. Cancellation drops every in-flight query and
//! discards whatever was merged so far.

use crate::embeddings::{Embedders, EmbeddingProvider};
use crate::ranking::Ranker;
use crate::store::StoreSet;
use crate::types::{ImageQuery, Modality, QuerySpec, RetrievedItem, MAX_RESULTS_LIMIT};
use futures::future::join_all;
use mosaic_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Results requested before excluding the source document.
const CROSS_REFERENCE_POOL: usize = 20;

/// Results returned by [`AggregatingRetriever::cross_references`].
const CROSS_REFERENCE_LIMIT: usize = 10;

/// Query vectors, one per vector space that the request needs.
#[derive(Debug, Default)]
struct QueryVectors {
    text: Option<Vec<f32>>,
    cross_modal: Option<Vec<f32>>,
}

impl QueryVectors {
    fn for_modality(&self, modality: Modality) -> Option<&[f32]> {
        match modality {
            Modality::Image => self.cross_modal.as_deref(),
            Modality::Document | Modality::Audio | Modality::Text => self.text.as_deref(),
        }
    }
}

pub struct AggregatingRetriever {
    stores: StoreSet,
    embedders: Embedders,
    ranker: Ranker,
    query_timeout: Duration,
}

impl AggregatingRetriever {
    pub fn new(
        stores: StoreSet,
        embedders: Embedders,
        ranker: Ranker,
        query_timeout: Duration,
    ) -> Self {
        Self {
            stores,
            embedders,
            ranker,
            query_timeout,
        }
    }

    /// LanceDB stores under the configured path, embedders and ranking
    /// from `config`.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let stores = StoreSet::open_lancedb(&config.store_path(), &config.embeddings).await?;
        Ok(Self::new(
            stores,
            Embedders::from_config(&config.embeddings)?,
            Ranker::new(config.ranking.clone()),
            Duration::from_millis(config.retrieval.query_timeout_ms),
        ))
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn stores(&self) -> &StoreSet {
        &self.stores
    }

    pub fn embedders(&self) -> &Embedders {
        &self.embedders
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    /// Search every modality `spec` enables, then merge, dedup, boost and
    /// rank. Returns [`AppError::Cancelled`] if `cancel` fires first.
    #[instrument(skip(self, spec, cancel), fields(max_results = spec.max_results()))]
    pub async fn search(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RetrievedItem>> {
        let work = async {
            let candidates = self.gather(spec).await;
            self.ranker.rank(candidates, spec.max_results())
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            items = work => Ok(items),
        }
    }

    /// Audio transcripts only.
    pub async fn search_audio(
        &self,
        text: &str,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RetrievedItem>> {
        let spec = QuerySpec::new(text)
            .with_max_results(max_results)
            .only(Modality::Audio);
        self.search(&spec, cancel).await
    }

    /// Nearest images to a precomputed image vector. When the image carries
    /// OCR text, a standard search over that text at half depth joins the
    /// candidates before the single ranking pass.
    #[instrument(skip(self, query, cancel), fields(has_text = query.extracted_text.is_some()))]
    pub async fn search_by_image(
        &self,
        query: &ImageQuery,
        max_results: usize,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RetrievedItem>> {
        let k = max_results.clamp(1, MAX_RESULTS_LIMIT);

        let work = async {
            let mut candidates = self
                .query_modality(Modality::Image, &query.embedding, k)
                .await;

            if let Some(text) = query
                .extracted_text
                .as_deref()
                .filter(|text| !text.trim().is_empty())
            {
                let spec = QuerySpec::new(text).with_max_results((k / 2).max(1));
                candidates.extend(self.gather(&spec).await);
            }

            self.ranker.rank(candidates, k)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            items = work => Ok(items),
        }
    }

    /// Content related to `content` from documents other than `document_id`.
    pub async fn cross_references(
        &self,
        document_id: &str,
        content: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RetrievedItem>> {
        let spec = QuerySpec::new(content).with_max_results(CROSS_REFERENCE_POOL);
        let items = self.search(&spec, cancel).await?;

        Ok(items
            .into_iter()
            .filter(|item| item.source_document_id != document_id)
            .take(CROSS_REFERENCE_LIMIT)
            .collect())
    }

    /// Unranked candidates from every modality `spec` enables, in modality
    /// order.
    async fn gather(&self, spec: &QuerySpec) -> Vec<RetrievedItem> {
        let modalities: Vec<Modality> = self
            .stores
            .iter()
            .map(|(modality, _)| modality)
            .filter(|modality| spec.searches(*modality))
            .collect();

        if modalities.is_empty() {
            debug!("No modality enabled for query");
            return Vec::new();
        }

        let vectors = self.embed_query(&spec.text, &modalities).await;
        let k = spec.max_results();

        let queries = modalities.iter().filter_map(|modality| {
            let vector = vectors.for_modality(*modality)?;
            Some(self.query_modality(*modality, vector, k))
        });

        let per_modality = join_all(queries).await;
        debug!(modalities = per_modality.len(), "Fan-out complete");
        per_modality.into_iter().flatten().collect()
    }

    /// Embed the query once per vector space needed by `modalities`.
    async fn embed_query(&self, text: &str, modalities: &[Modality]) -> QueryVectors {
        let needs_text = modalities.iter().any(|m| *m != Modality::Image);
        let needs_cross_modal = modalities.contains(&Modality::Image);

        let text_vector = async {
            if needs_text {
                self.embed_with(&self.embedders.text, text).await
            } else {
                None
            }
        };
        let cross_modal_vector = async {
            if needs_cross_modal {
                self.embed_with(&self.embedders.cross_modal, text).await
            } else {
                None
            }
        };

        let (text, cross_modal) = tokio::join!(text_vector, cross_modal_vector);
        QueryVectors { text, cross_modal }
    }

    async fn embed_with(&self, provider: &Arc<dyn EmbeddingProvider>, text: &str) -> Option<Vec<f32>> {
        match tokio::time::timeout(self.query_timeout, provider.embed(text)).await {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(e)) => {
                warn!(
                    embedder = provider.model_name(),
                    error = %e,
                    "Query embedding failed; skipping its modalities"
                );
                None
            }
            Err(_) => {
                warn!(
                    embedder = provider.model_name(),
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Query embedding timed out; skipping its modalities"
                );
                None
            }
        }
    }

    async fn query_modality(&self, modality: Modality, vector: &[f32], k: usize) -> Vec<RetrievedItem> {
        let Some(store) = self.stores.get(modality) else {
            return Vec::new();
        };

        match tokio::time::timeout(self.query_timeout, store.query(vector, k)).await {
            Ok(Ok(hits)) => {
                debug!(modality = %modality, count = hits.len(), "Modality query returned");
                hits.into_items(modality)
            }
            Ok(Err(e)) => {
                warn!(modality = %modality, error = %e, "Modality query failed; continuing without it");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    modality = %modality,
                    timeout_ms = self.query_timeout.as_millis() as u64,
                    "Modality query timed out; continuing without it"
                );
                Vec::new()
            }
        }
    }
}

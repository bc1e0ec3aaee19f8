//! Modality stores: the typed contract over one vector collection per
//! modality, plus the registry the retriever fans out over.

mod lance;
mod memory;
mod metadata;

pub use lance::LanceDbStore;
pub use memory::MemoryStore;
pub use metadata::{flatten_metadata, flatten_metadata_with, ListPolicy};

use crate::text::format_clock;
use crate::types::{Metadata, MetadataValue, Modality, RetrievedItem, TimeRange};
use mosaic_core::config::EmbeddingsConfig;
use mosaic_core::AppResult;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Raw nearest-neighbour rows, as parallel vectors of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHits {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
    pub distances: Vec<f32>,
}

impl QueryHits {
    pub fn push(&mut self, id: String, document: String, metadata: Metadata, distance: f32) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
        self.distances.push(distance);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Convert every row into a [`RetrievedItem`] of `modality`.
    pub fn into_items(self, modality: Modality) -> Vec<RetrievedItem> {
        self.ids
            .into_iter()
            .zip(self.documents)
            .zip(self.metadatas)
            .zip(self.distances)
            .map(|(((id, document), metadata), distance)| {
                build_item(modality, id, document, metadata, distance)
            })
            .collect()
    }
}

/// `max(0, 1 - distance)`, capped at 1. Non-finite distances score zero.
pub fn relevance_from_distance(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Typed query/store contract over one modality's vector collection.
#[async_trait::async_trait]
pub trait ModalityStore: Send + Sync {
    fn modality(&self) -> Modality;

    /// Idempotent upsert keyed by `id`.
    async fn store(
        &self,
        id: &str,
        embedding: &[f32],
        text: &str,
        metadata: &Metadata,
    ) -> AppResult<()>;

    /// At most `k` nearest neighbours, closest first. Empty when the
    /// collection is empty or does not exist yet.
    async fn query(&self, embedding: &[f32], k: usize) -> AppResult<QueryHits>;

    async fn count(&self) -> AppResult<usize>;

    /// Remove every row whose `document_id` metadata equals `document_id`.
    async fn delete_document(&self, document_id: &str) -> AppResult<()>;
}

/// Build a [`RetrievedItem`] from one stored row.
pub fn build_item(
    modality: Modality,
    id: String,
    content: String,
    metadata: Metadata,
    distance: f32,
) -> RetrievedItem {
    let source_document_id = metadata
        .get("document_id")
        .and_then(MetadataValue::as_str)
        .unwrap_or("unknown")
        .to_string();

    let page_number = metadata
        .get("page_number")
        .and_then(MetadataValue::as_i64)
        .and_then(|page| u32::try_from(page).ok());

    let timestamp_range = match (
        metadata.get("start_timestamp").and_then(MetadataValue::as_f64),
        metadata.get("end_timestamp").and_then(MetadataValue::as_f64),
    ) {
        (Some(start), Some(end)) => Some(TimeRange { start, end }),
        (Some(start), None) => Some(TimeRange { start, end: start }),
        _ => None,
    };

    RetrievedItem {
        id,
        source_document_id,
        content,
        modality,
        relevance_score: relevance_from_distance(distance),
        source_reference: source_reference(&metadata),
        page_number,
        timestamp_range,
        raw_metadata: metadata,
    }
}

/// Human-readable location of a stored row, derived from `content_type`.
pub fn source_reference(metadata: &Metadata) -> String {
    let content_type = metadata
        .get("content_type")
        .and_then(MetadataValue::as_str)
        .unwrap_or("");

    match content_type {
        "text_chunk" => {
            if let Some(page) = metadata.get("page_number").and_then(MetadataValue::as_i64) {
                format!("Document page {}", page)
            } else {
                let chunk = metadata
                    .get("chunk_index")
                    .and_then(MetadataValue::as_i64)
                    .unwrap_or(0);
                format!("Document chunk {}", chunk)
            }
        }
        "image" => {
            let filename = metadata
                .get("filename")
                .and_then(MetadataValue::as_str)
                .unwrap_or("Unknown");
            format!("Image: {}", filename)
        }
        "audio_transcript" => {
            let start = metadata
                .get("start_timestamp")
                .and_then(MetadataValue::as_f64)
                .unwrap_or(0.0);
            format!("Audio transcript at {}", format_clock(start))
        }
        "note" => match metadata.get("title").and_then(MetadataValue::as_str) {
            Some(title) if !title.is_empty() => format!("Note {}", title),
            _ => "Note".to_string(),
        },
        _ => "Unknown source".to_string(),
    }
}

/// Per-modality row counts.
pub type CollectionStats = BTreeMap<Modality, usize>;

/// The stores the retriever can fan out to, keyed by modality.
#[derive(Clone, Default)]
pub struct StoreSet {
    stores: BTreeMap<Modality, Arc<dyn ModalityStore>>,
}

impl StoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under its own modality, replacing any previous one.
    pub fn insert(&mut self, store: Arc<dyn ModalityStore>) {
        self.stores.insert(store.modality(), store);
    }

    pub fn with(mut self, store: Arc<dyn ModalityStore>) -> Self {
        self.insert(store);
        self
    }

    pub fn get(&self, modality: Modality) -> Option<&Arc<dyn ModalityStore>> {
        self.stores.get(&modality)
    }

    /// Stores in modality order.
    pub fn iter(&self) -> impl Iterator<Item = (Modality, &Arc<dyn ModalityStore>)> {
        self.stores.iter().map(|(modality, store)| (*modality, store))
    }

    /// One in-memory store per modality.
    pub fn in_memory() -> Self {
        Modality::ALL
            .into_iter()
            .fold(Self::new(), |set, modality| {
                set.with(Arc::new(MemoryStore::new(modality)))
            })
    }

    /// Open (or lazily create) one LanceDB table per modality under `path`.
    ///
    /// The image table lives in the cross-modal vector space; every other
    /// table uses the text embedder's dimensions.
    pub async fn open_lancedb(path: &Path, embeddings: &EmbeddingsConfig) -> AppResult<Self> {
        let mut set = Self::new();
        for modality in Modality::ALL {
            let dimensions = match modality {
                Modality::Image => embeddings.cross_modal.dimensions,
                _ => embeddings.text.dimensions,
            };
            let store = LanceDbStore::open(path, modality, dimensions).await?;
            set.insert(Arc::new(store));
        }
        tracing::debug!("Opened {} modality stores at {:?}", set.stores.len(), path);
        Ok(set)
    }

    /// Row count per modality. A store that cannot be counted is logged and
    /// left out.
    pub async fn collection_stats(&self) -> CollectionStats {
        let mut stats = CollectionStats::new();
        for (modality, store) in self.iter() {
            match store.count().await {
                Ok(count) => {
                    stats.insert(modality, count);
                }
                Err(e) => {
                    tracing::warn!(modality = %modality, error = %e, "Failed to count collection");
                }
            }
        }
        stats
    }

    /// Delete `document_id` from every store. Returns the modalities that
    /// failed; each failure is logged and the remaining stores still run.
    pub async fn delete_document(&self, document_id: &str) -> Vec<Modality> {
        let mut failed = Vec::new();
        for (modality, store) in self.iter() {
            if let Err(e) = store.delete_document(document_id).await {
                tracing::warn!(modality = %modality, error = %e, "Failed to delete document");
                failed.push(modality);
            }
        }
        failed
    }
}

/// Cosine similarity; zero for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, MetadataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_relevance_from_distance() {
        assert_eq!(relevance_from_distance(0.25), 0.75);
        assert_eq!(relevance_from_distance(1.7), 0.0);
        assert_eq!(relevance_from_distance(-0.5), 1.0);
        assert_eq!(relevance_from_distance(f32::NAN), 0.0);
    }

    #[test]
    fn test_source_reference_variants() {
        let page = meta(&[
            ("content_type", "text_chunk".into()),
            ("page_number", 4_i64.into()),
        ]);
        assert_eq!(source_reference(&page), "Document page 4");

        let chunk = meta(&[
            ("content_type", "text_chunk".into()),
            ("chunk_index", 7_i64.into()),
        ]);
        assert_eq!(source_reference(&chunk), "Document chunk 7");

        let image = meta(&[
            ("content_type", "image".into()),
            ("filename", "chart.png".into()),
        ]);
        assert_eq!(source_reference(&image), "Image: chart.png");

        let audio = meta(&[
            ("content_type", "audio_transcript".into()),
            ("start_timestamp", 125.4.into()),
        ]);
        assert_eq!(source_reference(&audio), "Audio transcript at 2:05");

        let note = meta(&[("content_type", "note".into()), ("title", "Ideas".into())]);
        assert_eq!(source_reference(&note), "Note Ideas");

        assert_eq!(source_reference(&Metadata::new()), "Unknown source");
    }

    #[test]
    fn test_build_item_reads_metadata() {
        let metadata = meta(&[
            ("content_type", "audio_transcript".into()),
            ("document_id", "call-7".into()),
            ("start_timestamp", 61.0.into()),
            ("end_timestamp", 75.5.into()),
        ]);

        let item = build_item(
            Modality::Audio,
            "seg-1".to_string(),
            "we shipped it".to_string(),
            metadata,
            0.2,
        );

        assert_eq!(item.source_document_id, "call-7");
        assert!((item.relevance_score - 0.8).abs() < 1e-6);
        assert_eq!(
            item.timestamp_range,
            Some(TimeRange {
                start: 61.0,
                end: 75.5
            })
        );
        assert_eq!(item.page_number, None);
        assert_eq!(item.source_reference, "Audio transcript at 1:01");
    }

    #[test]
    fn test_hits_into_items_keeps_order() {
        let mut hits = QueryHits::default();
        hits.push("a".into(), "first".into(), Metadata::new(), 0.1);
        hits.push("b".into(), "second".into(), Metadata::new(), 0.4);

        let items = hits.into_items(Modality::Document);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(items[0].source_document_id, "unknown");
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_store_set_stats_and_delete() {
        let set = StoreSet::in_memory();
        let doc_meta = meta(&[("document_id", "doc-1".into())]);

        let documents = set.get(Modality::Document).unwrap();
        documents
            .store("c1", &[1.0, 0.0], "alpha", &doc_meta)
            .await
            .unwrap();
        documents
            .store("c2", &[0.0, 1.0], "beta", &meta(&[("document_id", "doc-2".into())]))
            .await
            .unwrap();

        let stats = set.collection_stats().await;
        assert_eq!(stats[&Modality::Document], 2);
        assert_eq!(stats[&Modality::Audio], 0);

        assert!(set.delete_document("doc-1").await.is_empty());
        assert_eq!(set.collection_stats().await[&Modality::Document], 1);
    }
}

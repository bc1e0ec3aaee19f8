//! Brute-force in-memory modality store.

use super::{cosine_similarity, ModalityStore, QueryHits};
use crate::types::{Metadata, MetadataValue, Modality};
use mosaic_core::{AppError, AppResult};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Row {
    embedding: Vec<f32>,
    text: String,
    metadata: Metadata,
}

/// Cosine-distance store held in memory. Rows are kept in id order so
/// equal distances come back deterministically.
#[derive(Debug)]
pub struct MemoryStore {
    modality: Modality,
    rows: RwLock<BTreeMap<String, Row>>,
}

impl MemoryStore {
    pub fn new(modality: Modality) -> Self {
        Self {
            modality,
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl ModalityStore for MemoryStore {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn store(
        &self,
        id: &str,
        embedding: &[f32],
        text: &str,
        metadata: &Metadata,
    ) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.values().next() {
            if existing.embedding.len() != embedding.len() {
                return Err(AppError::Embedding(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    existing.embedding.len(),
                    embedding.len()
                )));
            }
        }
        rows.insert(
            id.to_string(),
            Row {
                embedding: embedding.to_vec(),
                text: text.to_string(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> AppResult<QueryHits> {
        let rows = self.rows.read().await;

        let mut scored: Vec<(&String, &Row, f32)> = rows
            .iter()
            .map(|(id, row)| (id, row, 1.0 - cosine_similarity(embedding, &row.embedding)))
            .collect();
        scored.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut hits = QueryHits::default();
        for (id, row, distance) in scored.into_iter().take(k) {
            hits.push(id.clone(), row.text.clone(), row.metadata.clone(), distance);
        }
        Ok(hits)
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.rows.read().await.len())
    }

    async fn delete_document(&self, document_id: &str) -> AppResult<()> {
        self.rows.write().await.retain(|_, row| {
            row.metadata.get("document_id").and_then(MetadataValue::as_str) != Some(document_id)
        });
        Ok(())
    }
}

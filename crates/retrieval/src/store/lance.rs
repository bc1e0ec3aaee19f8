//! LanceDB-backed modality store: one table per modality.

use super::{ModalityStore, QueryHits};
use crate::types::{Metadata, Modality};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use mosaic_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

const DISTANCE_COLUMN: &str = "_distance";

/// Vector store over a LanceDB table named after the modality's collection.
///
/// The table is created on first write; until then queries return nothing
/// and the count is zero.
pub struct LanceDbStore {
    modality: Modality,
    conn: Connection,
    table: RwLock<Option<Table>>,
    embedding_dim: usize,
}

impl LanceDbStore {
    /// Connect to the database at `db_path` and open the modality's table
    /// if it already exists.
    pub async fn open(db_path: &Path, modality: Modality, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::store(
                modality.as_str(),
                format!("Failed to create store directory: {}", e),
            )
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::store(modality.as_str(), format!("Failed to connect: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| {
                AppError::store(modality.as_str(), format!("Failed to list tables: {}", e))
            })?;

        let table = if table_names.iter().any(|name| name == modality.collection_name()) {
            Some(
                conn.open_table(modality.collection_name())
                    .execute()
                    .await
                    .map_err(|e| {
                        AppError::store(modality.as_str(), format!("Failed to open table: {}", e))
                    })?,
            )
        } else {
            None
        };

        tracing::debug!(
            modality = %modality,
            exists = table.is_some(),
            "Opened LanceDB collection {}",
            modality.collection_name()
        );

        Ok(Self {
            modality,
            conn,
            table: RwLock::new(table),
            embedding_dim,
        })
    }

    fn schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
            // Flat metadata map serialized as JSON
            Field::new("metadata", DataType::Utf8, false),
        ]))
    }

    fn unavailable(&self, what: &str, e: impl std::fmt::Display) -> AppError {
        AppError::store(self.modality.as_str(), format!("{}: {}", what, e))
    }

    fn check_dimensions(&self, embedding: &[f32]) -> AppResult<()> {
        if embedding.len() != self.embedding_dim {
            return Err(AppError::Embedding(format!(
                "{} embedding dimension mismatch: expected {}, got {}",
                self.modality,
                self.embedding_dim,
                embedding.len()
            )));
        }
        Ok(())
    }

    fn row_to_batch(
        &self,
        id: &str,
        embedding: &[f32],
        text: &str,
        metadata: &Metadata,
    ) -> AppResult<RecordBatch> {
        let document_id = metadata
            .get("document_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let metadata_json = serde_json::to_string(metadata)?;

        let embedding_array = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(embedding.to_vec())),
            None,
        );

        RecordBatch::try_new(
            Self::schema(self.embedding_dim),
            vec![
                Arc::new(StringArray::from(vec![id])),
                Arc::new(StringArray::from(vec![document_id])),
                Arc::new(StringArray::from(vec![text])),
                Arc::new(embedding_array),
                Arc::new(StringArray::from(vec![metadata_json.as_str()])),
            ],
        )
        .map_err(|e| self.unavailable("Failed to build record batch", e))
    }

    /// The table, creating it empty on first use.
    async fn table_for_write(&self) -> AppResult<Table> {
        if let Some(table) = self.table.read().await.as_ref() {
            return Ok(table.clone());
        }

        let mut guard = self.table.write().await;
        if let Some(table) = guard.as_ref() {
            return Ok(table.clone());
        }

        let schema = Self::schema(self.embedding_dim);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let table = self
            .conn
            .create_table(
                self.modality.collection_name(),
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| self.unavailable("Failed to create table", e))?;

        tracing::info!(modality = %self.modality, "Created collection {}", self.modality.collection_name());
        *guard = Some(table.clone());
        Ok(table)
    }

    async fn existing_table(&self) -> Option<Table> {
        self.table.read().await.clone()
    }

    fn read_rows(&self, batch: &RecordBatch, query: &[f32], hits: &mut QueryHits) -> AppResult<()> {
        let strings = |name: &str| -> AppResult<&StringArray> {
            batch
                .column_by_name(name)
                .and_then(|col| col.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| self.unavailable("Invalid column", name))
        };
        let ids = strings("id")?;
        let texts = strings("text")?;
        let metadatas = strings("metadata")?;

        let distances = batch
            .column_by_name(DISTANCE_COLUMN)
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());
        let embeddings = batch
            .column_by_name("embedding")
            .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>());

        for row in 0..batch.num_rows() {
            let metadata: Metadata = match serde_json::from_str(metadatas.value(row)) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(modality = %self.modality, error = %e, "Skipping row with unreadable metadata");
                    continue;
                }
            };

            let distance = match (distances, embeddings) {
                (Some(distances), _) => distances.value(row),
                (None, Some(embeddings)) => {
                    let values = embeddings.value(row);
                    let stored = values
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .map(|arr| arr.values().to_vec())
                        .unwrap_or_default();
                    1.0 - super::cosine_similarity(query, &stored)
                }
                (None, None) => 1.0,
            };

            hits.push(
                ids.value(row).to_string(),
                texts.value(row).to_string(),
                metadata,
                distance,
            );
        }
        Ok(())
    }
}

fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait::async_trait]
impl ModalityStore for LanceDbStore {
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
        self.check_dimensions(embedding)?;
        let batch = self.row_to_batch(id, embedding, text, metadata)?;
        let table = self.table_for_write().await?;

        // Single merge keyed on id: the old row stays until the new one lands.
        let schema = batch.schema();
        let mut merge = table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema)))
            .await
            .map_err(|e| self.unavailable("Failed to upsert row", e))?;

        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> AppResult<QueryHits> {
        self.check_dimensions(embedding)?;

        let Some(table) = self.existing_table().await else {
            return Ok(QueryHits::default());
        };

        let batches: Vec<RecordBatch> = table
            .query()
            .nearest_to(embedding.to_vec())
            .map_err(|e| self.unavailable("Failed to create query", e))?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| self.unavailable("Failed to execute search", e))?
            .try_collect()
            .await
            .map_err(|e| self.unavailable("Failed to collect results", e))?;

        let mut hits = QueryHits::default();
        for batch in &batches {
            self.read_rows(batch, embedding, &mut hits)?;
        }

        // Sort rows by distance, closest first, keeping at most k.
        let mut order: Vec<usize> = (0..hits.len()).collect();
        order.sort_by(|a, b| {
            hits.distances[*a]
                .partial_cmp(&hits.distances[*b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut sorted = QueryHits::default();
        for index in order.into_iter().take(k) {
            sorted.push(
                std::mem::take(&mut hits.ids[index]),
                std::mem::take(&mut hits.documents[index]),
                std::mem::take(&mut hits.metadatas[index]),
                hits.distances[index],
            );
        }

        tracing::debug!(modality = %self.modality, count = sorted.len(), "LanceDB query complete");
        Ok(sorted)
    }

    async fn count(&self) -> AppResult<usize> {
        match self.existing_table().await {
            Some(table) => table
                .count_rows(None)
                .await
                .map_err(|e| self.unavailable("Failed to count rows", e)),
            None => Ok(0),
        }
    }

    async fn delete_document(&self, document_id: &str) -> AppResult<()> {
        let Some(table) = self.existing_table().await else {
            return Ok(());
        };
        table
            .delete(&format!("document_id = {}", quoted(document_id)))
            .await
            .map_err(|e| self.unavailable("Failed to delete document", e))?;
        Ok(())
    }
}

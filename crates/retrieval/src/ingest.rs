//! Loading already-extracted assets into the modality stores.
//!
//! Input is either a JSONL manifest (one [`AssetRecord`] per line) or a
//! plain `.txt`/`.md` file, which is split into document chunks. Records
//! are stored independently: a record that fails to embed or store is
//! logged and counted, and the run continues.

use crate::embeddings::Embedders;
use crate::store::{flatten_metadata_with, ListPolicy, StoreSet};
use crate::types::{Metadata, MetadataValue, Modality};
use chrono::Utc;
use mosaic_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::path::Path;
use text_splitter::{ChunkConfig, TextSplitter};
use walkdir::WalkDir;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const MANIFEST_EXTENSIONS: &[&str] = &["jsonl"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// One extracted asset, as it appears on a manifest line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetRecord {
    TextChunk {
        #[serde(default)]
        id: Option<String>,
        document_id: String,
        content: String,
        #[serde(default)]
        chunk_index: Option<u32>,
        #[serde(default)]
        page_number: Option<u32>,
        #[serde(default)]
        embedding: Option<Vec<f32>>,
        #[serde(default)]
        metadata: Value,
    },
    Image {
        #[serde(default)]
        id: Option<String>,
        document_id: String,
        image_path: String,
        #[serde(default)]
        thumbnail_path: Option<String>,
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
        /// OCR output, if any.
        #[serde(default)]
        extracted_text: Option<String>,
        #[serde(default)]
        embedding: Option<Vec<f32>>,
        #[serde(default)]
        metadata: Value,
    },
    AudioSegment {
        #[serde(default)]
        id: Option<String>,
        document_id: String,
        transcript: String,
        start_timestamp: f64,
        end_timestamp: f64,
        #[serde(default)]
        confidence: Option<f64>,
        #[serde(default)]
        speaker: Option<String>,
        #[serde(default)]
        embedding: Option<Vec<f32>>,
        #[serde(default)]
        metadata: Value,
    },
    Note {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        document_id: Option<String>,
        #[serde(default)]
        title: Option<String>,
        content: String,
        #[serde(default)]
        embedding: Option<Vec<f32>>,
        #[serde(default)]
        metadata: Value,
    },
}

/// A record resolved to its store row, minus the vector if it still has to
/// be embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub id: String,
    pub modality: Modality,
    /// Stored row text.
    pub content: String,
    /// Text handed to the embedder when no vector was supplied.
    pub embed_text: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Metadata,
}

impl AssetRecord {
    pub fn modality(&self) -> Modality {
        match self {
            AssetRecord::TextChunk { .. } => Modality::Document,
            AssetRecord::Image { .. } => Modality::Image,
            AssetRecord::AudioSegment { .. } => Modality::Audio,
            AssetRecord::Note { .. } => Modality::Text,
        }
    }

    /// Resolve the row to store. `None` means the record has nothing to
    /// index (blank text or transcript).
    pub fn prepare(self) -> Option<PreparedRecord> {
        let modality = self.modality();
        match self {
            AssetRecord::TextChunk {
                id,
                document_id,
                content,
                chunk_index,
                page_number,
                embedding,
                metadata,
            } => {
                if content.trim().is_empty() {
                    return None;
                }
                let mut fields = flatten_metadata_with(&metadata, ListPolicy::Join);
                fields.insert("document_id".into(), document_id.into());
                fields.insert("chunk_index".into(), chunk_index.unwrap_or(0).into());
                if let Some(page) = page_number {
                    fields.insert("page_number".into(), page.into());
                }
                fields.insert("content_type".into(), "text_chunk".into());

                Some(PreparedRecord {
                    id: id.unwrap_or_else(new_id),
                    modality,
                    embed_text: content.clone(),
                    content,
                    embedding,
                    metadata: fields,
                })
            }
            AssetRecord::Image {
                id,
                document_id,
                image_path,
                thumbnail_path,
                width,
                height,
                extracted_text,
                embedding,
                metadata,
            } => {
                let filename = Path::new(&image_path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| image_path.clone());
                let text = extracted_text.filter(|text| !text.trim().is_empty());

                let mut fields = flatten_metadata_with(&metadata, ListPolicy::Join);
                fields.insert("document_id".into(), document_id.into());
                fields.insert("image_path".into(), image_path.as_str().into());
                fields.insert("filename".into(), filename.as_str().into());
                fields.insert(
                    "thumbnail_path".into(),
                    thumbnail_path.unwrap_or_default().into(),
                );
                if let Some(width) = width {
                    fields.insert("width".into(), width.into());
                }
                if let Some(height) = height {
                    fields.insert("height".into(), height.into());
                }
                fields.insert("has_text".into(), text.is_some().into());
                fields.insert("content_type".into(), "image".into());

                Some(PreparedRecord {
                    id: id.unwrap_or_else(new_id),
                    modality,
                    content: text
                        .clone()
                        .unwrap_or_else(|| format!("Image: {}", image_path)),
                    embed_text: text.unwrap_or(filename),
                    embedding,
                    metadata: fields,
                })
            }
            AssetRecord::AudioSegment {
                id,
                document_id,
                transcript,
                start_timestamp,
                end_timestamp,
                confidence,
                speaker,
                embedding,
                metadata,
            } => {
                if transcript.trim().is_empty() {
                    return None;
                }
                // word-level timing lists are not worth keeping
                let mut fields = flatten_metadata_with(&metadata, ListPolicy::Drop);
                fields.insert("document_id".into(), document_id.into());
                fields.insert("start_timestamp".into(), start_timestamp.into());
                fields.insert("end_timestamp".into(), end_timestamp.into());
                fields.insert("confidence".into(), confidence.unwrap_or(0.0).into());
                fields.insert(
                    "speaker".into(),
                    speaker.unwrap_or_else(|| "unknown".to_string()).into(),
                );
                fields.insert("content_type".into(), "audio_transcript".into());

                Some(PreparedRecord {
                    id: id.unwrap_or_else(new_id),
                    modality,
                    embed_text: transcript.clone(),
                    content: transcript,
                    embedding,
                    metadata: fields,
                })
            }
            AssetRecord::Note {
                id,
                document_id,
                title,
                content,
                embedding,
                metadata,
            } => {
                if content.trim().is_empty() {
                    return None;
                }
                let id = id.unwrap_or_else(new_id);
                let mut fields = flatten_metadata_with(&metadata, ListPolicy::Join);
                fields.insert(
                    "document_id".into(),
                    document_id.unwrap_or_else(|| id.clone()).into(),
                );
                if let Some(title) = title {
                    fields.insert("title".into(), title.into());
                }
                fields.insert("content_type".into(), "note".into());

                Some(PreparedRecord {
                    id,
                    modality,
                    embed_text: content.clone(),
                    content,
                    embedding,
                    metadata: fields,
                })
            }
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Outcome counts of an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub stored: usize,
    /// Records with nothing to index.
    pub skipped: usize,
    /// Records that could not be parsed, embedded or stored.
    pub failed: usize,
}

impl AddAssign for IngestReport {
    fn add_assign(&mut self, other: Self) {
        self.stored += other.stored;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

pub struct Ingestor {
    stores: StoreSet,
    embedders: Embedders,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Ingestor {
    pub fn new(stores: StoreSet, embedders: Embedders) -> Self {
        Self {
            stores,
            embedders,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    /// Embed what is missing, then store each record on its own.
    pub async fn ingest_records(&self, records: Vec<AssetRecord>) -> IngestReport {
        let mut report = IngestReport::default();

        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            match record.prepare() {
                Some(row) => prepared.push(row),
                None => report.skipped += 1,
            }
        }

        let mut by_modality: BTreeMap<Modality, Vec<PreparedRecord>> = BTreeMap::new();
        for row in prepared {
            by_modality.entry(row.modality).or_default().push(row);
        }

        for (modality, rows) in by_modality {
            let (rows, lost) = self.fill_embeddings(modality, rows).await;
            report.failed += lost;
            if rows.is_empty() {
                continue;
            }

            let Some(store) = self.stores.get(modality) else {
                tracing::warn!(modality = %modality, count = rows.len(), "No store for modality");
                report.failed += rows.len();
                continue;
            };

            for (row, embedding) in rows {
                match store
                    .store(&row.id, &embedding, &row.content, &row.metadata)
                    .await
                {
                    Ok(()) => report.stored += 1,
                    Err(e) => {
                        tracing::warn!(modality = %modality, id = %row.id, error = %e, "Failed to store record");
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::debug!(?report, "Ingested records");
        report
    }

    /// Pair every row with its vector, batch-embedding the ones that came
    /// without. Rows with a precomputed vector always survive; when the batch
    /// fails only the rows that needed it are lost, and their count is
    /// returned alongside the survivors.
    async fn fill_embeddings(
        &self,
        modality: Modality,
        rows: Vec<PreparedRecord>,
    ) -> (Vec<(PreparedRecord, Vec<f32>)>, usize) {
        let mut paired = Vec::with_capacity(rows.len());
        let mut missing = Vec::new();
        for mut row in rows {
            match row.embedding.take() {
                Some(embedding) => paired.push((row, embedding)),
                None => missing.push(row),
            }
        }

        if missing.is_empty() {
            return (paired, 0);
        }

        let texts: Vec<String> = missing.iter().map(|row| row.embed_text.clone()).collect();
        let computed = match self.embedders.for_modality(modality).embed_batch(&texts).await {
            Ok(computed) if computed.len() == missing.len() => computed,
            Ok(computed) => {
                tracing::warn!(
                    modality = %modality,
                    expected = missing.len(),
                    returned = computed.len(),
                    "Embedder returned the wrong number of vectors"
                );
                return (paired, missing.len());
            }
            Err(e) => {
                tracing::warn!(modality = %modality, count = missing.len(), error = %e, "Failed to embed records");
                return (paired, missing.len());
            }
        };

        paired.extend(missing.into_iter().zip(computed));
        (paired, 0)
    }

    /// Split plain text into document chunk records.
    pub fn chunk_document(
        &self,
        document_id: &str,
        text: &str,
        source_path: &str,
    ) -> AppResult<Vec<AssetRecord>> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|e| AppError::Config(format!("Invalid chunking settings: {}", e)))?;
        let splitter = TextSplitter::new(config);
        let ingested_at = Utc::now().to_rfc3339();

        Ok(splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .enumerate()
            .map(|(index, chunk)| AssetRecord::TextChunk {
                id: Some(format!("{}_chunk_{}", document_id, index)),
                document_id: document_id.to_string(),
                content: chunk.to_string(),
                chunk_index: Some(index as u32),
                page_number: None,
                embedding: None,
                metadata: serde_json::json!({
                    "source_path": source_path,
                    "ingested_at": ingested_at,
                }),
            })
            .collect())
    }

    /// Ingest a manifest, a text file, or every supported file under a
    /// directory.
    pub async fn ingest_path(&self, path: &Path) -> AppResult<IngestReport> {
        if !path.exists() {
            return Err(AppError::Config(format!("Path not found: {:?}", path)));
        }

        let mut report = IngestReport::default();
        if path.is_file() {
            report += self.ingest_file(path).await?;
            return Ok(report);
        }

        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if !entry_path.is_file() || file_kind(entry_path).is_none() {
                continue;
            }
            match self.ingest_file(entry_path).await {
                Ok(file_report) => report += file_report,
                Err(e) => {
                    tracing::warn!(path = ?entry_path, error = %e, "Failed to ingest file");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed,
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path) -> AppResult<IngestReport> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Ingesting {:?}", path);

        match file_kind(path) {
            Some(FileKind::Manifest) => {
                let (records, malformed) = parse_manifest(&content);
                let mut report = self.ingest_records(records).await;
                report.failed += malformed;
                Ok(report)
            }
            Some(FileKind::Text) => {
                let document_id = new_id();
                let records =
                    self.chunk_document(&document_id, &content, &path.to_string_lossy())?;
                Ok(self.ingest_records(records).await)
            }
            None => Err(AppError::Config(format!(
                "Unsupported file type: {:?} (expected .jsonl, .txt or .md)",
                path
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Manifest,
    Text,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if MANIFEST_EXTENSIONS.contains(&extension.as_str()) {
        Some(FileKind::Manifest)
    } else if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        Some(FileKind::Text)
    } else {
        None
    }
}

/// Parse manifest lines, skipping blanks. Returns the records and the
/// number of malformed lines.
pub fn parse_manifest(content: &str) -> (Vec<AssetRecord>, usize) {
    let mut records = Vec::new();
    let mut malformed = 0;
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AssetRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(line = number + 1, error = %e, "Skipping malformed manifest line");
                malformed += 1;
            }
        }
    }
    (records, malformed)
}

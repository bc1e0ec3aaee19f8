//! Deterministic collaborators for scenario tests.

use crate::citation::CitationExtractor;
use crate::embeddings::{Embedders, EmbeddingProvider};
use crate::engine::{EngineOptions, RagEngine};
use crate::ranking::Ranker;
use crate::retriever::AggregatingRetriever;
use crate::session::SessionStore;
use crate::store::{MemoryStore, ModalityStore, QueryHits, StoreSet};
use crate::types::{Metadata, MetadataValue, Modality, RetrievedItem};
use mosaic_core::config::CitationConfig;
use mosaic_core::{AppError, AppResult};
use mosaic_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use mosaic_prompt::builtin_prompt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DIMS: usize = 3;

/// Every store call fails as if the backend were down.
pub struct FailingStore {
    pub modality: Modality,
}

#[async_trait::async_trait]
impl ModalityStore for FailingStore {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn store(&self, _: &str, _: &[f32], _: &str, _: &Metadata) -> AppResult<()> {
        Err(AppError::store(self.modality.as_str(), "connection refused"))
    }

    async fn query(&self, _: &[f32], _: usize) -> AppResult<QueryHits> {
        Err(AppError::store(self.modality.as_str(), "connection refused"))
    }

    async fn count(&self) -> AppResult<usize> {
        Err(AppError::store(self.modality.as_str(), "connection refused"))
    }

    async fn delete_document(&self, _: &str) -> AppResult<()> {
        Err(AppError::store(self.modality.as_str(), "connection refused"))
    }
}

/// Answers queries only after `delay`.
pub struct SlowStore {
    pub inner: MemoryStore,
    pub delay: Duration,
}

#[async_trait::async_trait]
impl ModalityStore for SlowStore {
    fn modality(&self) -> Modality {
        self.inner.modality()
    }

    async fn store(&self, id: &str, embedding: &[f32], text: &str, metadata: &Metadata) -> AppResult<()> {
        self.inner.store(id, embedding, text, metadata).await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> AppResult<QueryHits> {
        tokio::time::sleep(self.delay).await;
        self.inner.query(embedding, k).await
    }

    async fn count(&self) -> AppResult<usize> {
        self.inner.count().await
    }

    async fn delete_document(&self, document_id: &str) -> AppResult<()> {
        self.inner.delete_document(document_id).await
    }
}

/// Fixed vectors per exact input text; everything else maps to `fallback`.
#[derive(Debug)]
pub struct ScriptedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    fail: bool,
    delay: Duration,
}

impl ScriptedEmbedder {
    pub fn new(fallback: [f32; DIMS]) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback: fallback.to_vec(),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new([0.0; DIMS])
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with(mut self, text: &str, vector: [f32; DIMS]) -> Self {
        self.vectors.insert(text.to_string(), vector.to_vec());
        self
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for ScriptedEmbedder {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AppError::Embedding("embedder offline".to_string()));
        }
        Ok(texts
            .iter()
            .map(|text| self.vectors.get(text).unwrap_or(&self.fallback).clone())
            .collect())
    }
}

/// Returns a canned answer (or error) and keeps every request it saw.
pub struct ScriptedGenerator {
    reply: Result<String, String>,
    delay: Duration,
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            reply: Ok(answer.to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err("model not loaded".to_string()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.prompt.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedGenerator {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.reply {
            Ok(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 10),
            }),
            Err(reason) => Err(AppError::Generator(reason.clone())),
        }
    }
}

pub fn metadata(document_id: &str, content_type: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("document_id".into(), MetadataValue::from(document_id));
    metadata.insert("content_type".into(), MetadataValue::from(content_type));
    metadata
}

/// A memory store pre-filled with `(id, document_id, vector, text)` rows.
pub async fn filled_store(
    modality: Modality,
    rows: &[(&str, &str, [f32; DIMS], &str)],
) -> MemoryStore {
    let content_type = match modality {
        Modality::Document => "text_chunk",
        Modality::Image => "image",
        Modality::Audio => "audio_transcript",
        Modality::Text => "note",
    };
    let store = MemoryStore::new(modality);
    for (id, document_id, vector, text) in rows {
        store
            .store(id, vector, text, &metadata(document_id, content_type))
            .await
            .unwrap();
    }
    store
}

pub fn retriever(stores: StoreSet, text: ScriptedEmbedder, cross_modal: ScriptedEmbedder) -> AggregatingRetriever {
    AggregatingRetriever::new(
        stores,
        Embedders::new(Arc::new(text), Arc::new(cross_modal)),
        Ranker::default(),
        Duration::from_millis(200),
    )
}

pub fn engine(
    retriever: AggregatingRetriever,
    generator: Arc<ScriptedGenerator>,
    extraction: ScriptedEmbedder,
) -> RagEngine {
    let options = EngineOptions {
        generator_timeout: Duration::from_millis(200),
        ..EngineOptions::default()
    };
    RagEngine::new(
        Arc::new(retriever),
        generator,
        builtin_prompt(),
        CitationExtractor::new(Arc::new(extraction), CitationConfig::default(), Duration::from_secs(1)),
        Arc::new(SessionStore::new(10)),
        options,
    )
}

pub fn item(id: &str, content: &str, relevance: f32) -> RetrievedItem {
    RetrievedItem {
        id: id.to_string(),
        source_document_id: format!("doc-{}", id),
        content: content.to_string(),
        modality: Modality::Document,
        relevance_score: relevance,
        source_reference: format!("Document chunk {}", id),
        page_number: None,
        timestamp_range: None,
        raw_metadata: Metadata::new(),
    }
}

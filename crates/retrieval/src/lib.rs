//! Cross-modal retrieval, ranking and citation attribution.
//!
//! Documents, images, audio transcripts and notes live in one vector store
//! per modality. A query fans out to every selected store, results are
//! deduplicated and ranked, and the generator's answer is attributed back
//! to the ranked items it drew on.

pub mod citation;
pub mod confidence;
pub mod context;
pub mod embeddings;
pub mod engine;
pub mod ingest;
pub mod intent;
pub mod ranking;
pub mod retriever;
pub mod session;
pub mod store;
pub mod text;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use citation::{Citation, CitationExtractor};
pub use confidence::{ConfidenceScorer, DEFAULT_CONFIDENCE};
pub use embeddings::{create_provider, Embedders, EmbeddingProvider};
pub use engine::{EngineOptions, RagEngine, RagResponse};
pub use ingest::{AssetRecord, IngestReport, Ingestor};
pub use intent::{analyze as query_intent, QueryIntent};
pub use ranking::Ranker;
pub use retriever::AggregatingRetriever;
pub use session::SessionStore;
pub use store::{CollectionStats, LanceDbStore, MemoryStore, ModalityStore, StoreSet};
pub use types::{
    ImageQuery, Metadata, MetadataValue, Modality, QuerySpec, RetrievedItem, TimeRange,
};

//! Command handlers for the Mosaic CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod delete;
pub mod ingest;
pub mod prompts;
pub mod related;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use delete::DeleteCommand;
pub use ingest::IngestCommand;
pub use prompts::PromptsCommand;
pub use related::RelatedCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};
use mosaic_retrieval::{query_intent, Modality, QuerySpec, RetrievedItem, StoreSet};

/// Modality selection shared by `ask` and `search`.
#[derive(Args, Debug, Clone, Default)]
pub struct ModalityArgs {
    /// Search documents (and notes)
    #[arg(long)]
    pub documents: bool,

    /// Search images
    #[arg(long)]
    pub images: bool,

    /// Search audio transcripts
    #[arg(long)]
    pub audio: bool,

    /// Restrict to these modalities (document, image, audio, text)
    #[arg(long = "only", value_parser = parse_modality)]
    pub only: Vec<Modality>,

    /// Narrow modalities from keywords in the query when none are given
    #[arg(long)]
    pub auto_filter: bool,
}

impl ModalityArgs {
    /// No include flag means every modality is searched.
    pub fn to_spec(&self, query: &str) -> QuerySpec {
        let mut spec = QuerySpec::new(query);
        if self.documents || self.images || self.audio {
            spec.include_documents = self.documents;
            spec.include_images = self.images;
            spec.include_audio = self.audio;
        }

        if !self.only.is_empty() {
            spec = spec.with_filters(self.only.iter().copied());
        } else if self.auto_filter {
            let intent = query_intent(query);
            tracing::debug!(?intent, "Query intent");
            if !intent.modality_hints.is_empty() {
                spec = spec.with_filters(intent.modality_hints);
            }
        }
        spec
    }
}

fn parse_modality(value: &str) -> Result<Modality, String> {
    Modality::parse(value).ok_or_else(|| {
        format!(
            "unknown modality '{}' (expected document, image, audio or text)",
            value
        )
    })
}

/// Open the configured stores without building embedders or a generator.
pub async fn open_stores(config: &AppConfig) -> AppResult<StoreSet> {
    StoreSet::open_lancedb(&config.store_path(), &config.embeddings).await
}

/// Ranked results as numbered lines.
pub fn print_items(items: &[RetrievedItem]) {
    if items.is_empty() {
        println!("No results.");
        return;
    }

    for (index, item) in items.iter().enumerate() {
        println!(
            "[{}] {} ({}, relevance {:.2})",
            index + 1,
            item.source_reference,
            item.modality,
            item.relevance_score
        );
        println!("    {}", mosaic_retrieval::text::truncate_with_ellipsis(&item.content, 160));
        println!("    document: {}", item.source_document_id);
    }
}

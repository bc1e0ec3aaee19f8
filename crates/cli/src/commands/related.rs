//! Related command handler.

use super::print_items;
use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};
use mosaic_retrieval::AggregatingRetriever;
use tokio_util::sync::CancellationToken;

/// Content related to a document, from other documents
#[derive(Args, Debug)]
pub struct RelatedCommand {
    /// Document whose own items are excluded
    pub document_id: String,

    /// Content to find related material for
    pub content: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RelatedCommand {
    pub async fn execute(&self, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
        tracing::info!(document_id = %self.document_id, "Finding cross references");

        let retriever = AggregatingRetriever::from_config(config).await?;
        let items = retriever
            .cross_references(&self.document_id, &self.content, cancel)
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&items)?);
        } else {
            print_items(&items);
        }
        Ok(())
    }
}

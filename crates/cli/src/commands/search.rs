//! Search command handler.
//!
//! Runs the retrieval fan-out and prints the ranked items; no generator is
//! involved.

use super::{print_items, ModalityArgs};
use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};
use mosaic_retrieval::AggregatingRetriever;
use tokio_util::sync::CancellationToken;

/// Ranked retrieval without generation
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search text
    pub query: String,

    #[command(flatten)]
    pub modalities: ModalityArgs,

    /// Maximum number of results (1-50)
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
        tracing::info!("Executing search command");
        tracing::debug!("Search options: {:?}", self);

        let retriever = AggregatingRetriever::from_config(config).await?;
        let spec = self
            .modalities
            .to_spec(&self.query)
            .with_max_results(self.max_results.unwrap_or(config.retrieval.max_results));
        let items = retriever.search(&spec, cancel).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&items)?);
        } else {
            print_items(&items);
        }
        Ok(())
    }
}

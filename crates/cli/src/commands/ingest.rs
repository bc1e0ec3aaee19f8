//! Ingest command handler.
//!
//! Loads a JSONL manifest of extracted assets, a text file, or a directory
//! of them into the modality stores.

use super::open_stores;
use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};
use mosaic_retrieval::{Embedders, Ingestor};
use std::path::PathBuf;

/// Load extracted assets into the stores
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Manifest (.jsonl), text file (.txt, .md) or directory
    pub path: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Ingesting {:?}", self.path);

        let ingestor = Ingestor::new(
            open_stores(config).await?,
            Embedders::from_config(&config.embeddings)?,
        );
        let report = ingestor.ingest_path(&self.path).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Stored {} records ({} skipped, {} failed)",
                report.stored, report.skipped, report.failed
            );
        }
        Ok(())
    }
}

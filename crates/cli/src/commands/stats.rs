//! Stats command handler.
//!
//! Handles per-modality collection size display.

use super::open_stores;
use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};

/// Show per-modality collection sizes
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = open_stores(config).await?.collection_stats().await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Store: {}", config.store_path().display());
        for (modality, count) in &stats {
            println!("  {:<10} {}", modality.as_str(), count);
        }
        println!("  {:<10} {}", "total", stats.values().sum::<usize>());
        Ok(())
    }
}

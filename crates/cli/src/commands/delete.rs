//! Delete command handler.

use super::open_stores;
use clap::Args;
use mosaic_core::{config::AppConfig, AppError, AppResult};

/// Remove a document from every store
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Document identifier
    pub document_id: String,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(document_id = %self.document_id, "Deleting document");

        let failed = open_stores(config)
            .await?
            .delete_document(&self.document_id)
            .await;

        if failed.is_empty() {
            println!("Deleted document {}", self.document_id);
            return Ok(());
        }

        let names: Vec<_> = failed.iter().map(|m| m.as_str()).collect();
        Err(AppError::Other(format!(
            "Document {} could not be removed from: {}",
            self.document_id,
            names.join(", ")
        )))
    }
}

//! Generator provider factory.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use mosaic_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create a generator client for `provider`.
///
/// `timeout` bounds every HTTP request the client makes.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or(OllamaClient::DEFAULT_URL);
            let client = OllamaClient::with_base_url(base_url, timeout)?;
            Ok(Arc::new(client))
        }
        other => Err(AppError::Config(format!("Unknown provider: {}", other))),
    }
}

//! Ask command handler.
//!
//! Retrieves context across modalities, generates an answer and prints it
//! with its citations.

use super::ModalityArgs;
use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};
use mosaic_retrieval::citation::{format_for_markdown, usage_stats, validate};
use mosaic_retrieval::{RagEngine, RagResponse};
use tokio_util::sync::CancellationToken;

/// Answer a question with cited sources
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    #[command(flatten)]
    pub modalities: ModalityArgs,

    /// Maximum context items handed to the generator
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Conversation session to record the exchange under
    #[arg(long)]
    pub session: Option<String>,

    /// Output as JSON
    #[arg(long, conflicts_with = "markdown")]
    pub json: bool,

    /// Output as Markdown with a sources section
    #[arg(long)]
    pub markdown: bool,

    /// Check citation markers against the returned citations
    #[arg(long)]
    pub validate: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut config = config.clone();
        if let Some(max) = self.max_results {
            config.retrieval.max_context_items = max.max(1);
        }

        let engine = RagEngine::from_config(&config).await?;
        let spec = self.modalities.to_spec(&self.query);
        let response = engine
            .answer(&spec, self.session.as_deref(), cancel)
            .await?;

        if self.json {
            self.print_json(&response)?;
        } else if self.markdown {
            println!("{}\n", response.answer);
            if !response.cited.is_empty() {
                println!("{}", format_for_markdown(&response.cited));
            }
            self.print_validation(&response);
        } else {
            print_text(&response);
            self.print_validation(&response);
        }

        Ok(())
    }

    fn print_json(&self, response: &RagResponse) -> AppResult<()> {
        let mut output = serde_json::to_value(response)?;
        if self.validate {
            output["validation"] = serde_json::to_value(validate(&response.answer, &response.cited))?;
            output["usage"] = serde_json::to_value(usage_stats(&response.answer, &response.cited))?;
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn print_validation(&self, response: &RagResponse) {
        if !self.validate {
            return;
        }

        let validation = validate(&response.answer, &response.cited);
        let usage = usage_stats(&response.answer, &response.cited);
        println!();
        println!(
            "Citations: {} valid, {} invalid, {} missing content",
            validation.valid, validation.invalid, validation.missing_content
        );
        for issue in &validation.issues {
            println!("  - {}", issue);
        }
        println!(
            "Density: {:.2} per 100 words, coverage {:.0}%",
            usage.citation_density, usage.coverage_score
        );
    }
}

pub(crate) fn print_text(response: &RagResponse) {
    println!("{}", response.answer);

    if !response.citations.is_empty() {
        println!("\nSources:");
        for citation in &response.citations {
            println!(
                "  [{}] {} ({}, relevance {:.2})",
                citation.number, citation.source, citation.modality, citation.relevance_score
            );
        }
    }

    println!(
        "\nConfidence: {:.2} ({} ms)",
        response.confidence, response.processing_time_ms
    );
}

//! Chat command handler.
//!
//! Interactive question loop over one conversation session. Lines starting
//! with `/` are commands: `/clear`, `/summary`, `/exit`.

use super::ask::print_text;
use super::ModalityArgs;
use clap::Args;
use mosaic_core::{config::AppConfig, AppError, AppResult};
use mosaic_retrieval::RagEngine;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Interactive conversation with session memory
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Session identifier
    #[arg(long, default_value = "default")]
    pub session: String,

    #[command(flatten)]
    pub modalities: ModalityArgs,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig, cancel: &CancellationToken) -> AppResult<()> {
        tracing::info!(session = %self.session, "Starting chat");

        let engine = RagEngine::from_config(config).await?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("Chatting in session '{}'. Type /exit to leave.", self.session);
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };

            match line.trim() {
                "" => continue,
                "/exit" | "/quit" => break,
                "/clear" => {
                    engine.sessions().clear(&self.session);
                    println!("Session cleared.");
                }
                "/summary" => {
                    let summary = engine.sessions().summary(&self.session);
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                query => {
                    let spec = self.modalities.to_spec(query);
                    match engine.answer(&spec, Some(&self.session), cancel).await {
                        Ok(response) => {
                            print_text(&response);
                            println!();
                        }
                        Err(AppError::Cancelled) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Ok(())
    }
}

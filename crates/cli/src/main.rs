//! Mosaic CLI
//!
//! Main entry point for the mosaic command-line tool.
//! Answers questions over documents, images and audio transcripts with
//! numbered source citations.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AskCommand, ChatCommand, DeleteCommand, IngestCommand, PromptsCommand, RelatedCommand,
    SearchCommand, StatsCommand,
};
use mosaic_core::logging::{self, LogFormat};
use mosaic_core::{config::AppConfig, AppResult};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Mosaic - cross-modal retrieval with cited answers
#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(about = "Cross-modal retrieval with cited answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "MOSAIC_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MOSAIC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generator provider (ollama)
    #[arg(short, long, global = true, env = "MOSAIC_PROVIDER")]
    provider: Option<String>,

    /// Generator model identifier
    #[arg(short, long, global = true, env = "MOSAIC_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question with cited sources
    Ask(AskCommand),

    /// Interactive conversation with session memory
    Chat(ChatCommand),

    /// Ranked retrieval without generation
    Search(SearchCommand),

    /// Content related to a document, from other documents
    Related(RelatedCommand),

    /// Load extracted assets into the stores
    Ingest(IngestCommand),

    /// Show per-modality collection sizes
    Stats(StatsCommand),

    /// Remove a document from every store
    Delete(DeleteCommand),

    /// List available prompt definitions
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from the config file and environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::info!("Mosaic CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_mosaic_dir()?;

    // Ctrl-C cancels whatever request is in flight
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; cancelling");
            on_interrupt.cancel();
        }
    });

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Search(_) => "search",
        Commands::Related(_) => "related",
        Commands::Ingest(_) => "ingest",
        Commands::Stats(_) => "stats",
        Commands::Delete(_) => "delete",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config, &cancel).await,
        Commands::Chat(cmd) => cmd.execute(&config, &cancel).await,
        Commands::Search(cmd) => cmd.execute(&config, &cancel).await,
        Commands::Related(cmd) => cmd.execute(&config, &cancel).await,
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}

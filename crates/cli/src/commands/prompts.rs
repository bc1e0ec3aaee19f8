//! Prompts command handler.

use clap::Args;
use mosaic_core::{config::AppConfig, AppResult};
use mosaic_prompt::{list_prompts, resolve_prompt, BUILTIN_RAG_PROMPT_ID};

/// List available prompt definitions
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the resolved definition with this id
    #[arg(long)]
    pub show: Option<String>,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let dir = config.prompts_dir();

        if let Some(id) = &self.show {
            let prompt = resolve_prompt(&dir, id)?;
            println!("{} - {}", prompt.id, prompt.title);
            if let Some(system) = &prompt.system {
                println!("\nSYSTEM:\n{}", system);
            }
            println!("\nTEMPLATE:\n{}", prompt.template);
            return Ok(());
        }

        for id in list_prompts(&dir)? {
            let marker = if id == config.generator.prompt { "*" } else { " " };
            let builtin = id == BUILTIN_RAG_PROMPT_ID && !dir.join(format!("{}.yml", id)).exists();
            println!("{} {}{}", marker, id, if builtin { " (built-in)" } else { "" });
        }
        Ok(())
    }
}

//! Prompt definitions for the Mosaic answer generator.
//!
//! A prompt definition is a small YAML document holding a system
//! instruction and a user template, both rendered with Handlebars. The
//! retrieval engine fills the `query`, `context` and `history` variables.
//! Workspaces may override the built-in definition by dropping a file into
//! `.mosaic/prompts/<id>.yml`.

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

pub use builder::build_prompt;
pub use builtin::{builtin_prompt, BUILTIN_RAG_PROMPT_ID};
pub use loader::{list_prompts, load_prompt, resolve_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptContextConfig, PromptDefinition};

//! Answer generator integration for Mosaic.
//!
//! The retrieval pipeline treats the generator as an external collaborator
//! with one operation: given a system instruction and a user prompt, return
//! answer text. This crate provides that contract as the [`LlmClient`]
//! trait plus an Ollama implementation.
//!
//! # Example
//! ```no_run
//! use mosaic_llm::{LlmClient, LlmRequest, OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is in the Q3 report?", "llama3.2")
//!     .with_system("Answer from the numbered context blocks.");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;

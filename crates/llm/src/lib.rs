//! LLM integration crate for the Insight engine.
//!
//! This crate provides a provider-agnostic abstraction for text completion
//! and the retry/timeout policy every external call goes through.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Any OpenAI-compatible chat completions endpoint
//! - **Scripted**: Replays queued replies, for tests and offline demos
//!
//! # Example
//! ```no_run
//! use insight_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod retry;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{client_from_config, create_client};
pub use providers::{OllamaClient, OpenAiClient, ScriptedClient};
pub use retry::{message_looks_transient, retry_with_backoff, ResilientClient, RetryPolicy};
pub use types::ProviderType;

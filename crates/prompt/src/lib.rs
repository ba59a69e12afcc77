//! Prompt system for the Insight engine.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - A built-in library covering every completion the engine makes
//! - Workspace overrides under `.insight/prompts/`
//! - Handlebars template rendering

pub mod builder;
pub mod library;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use library::{ids, PromptLibrary};
pub use loader::{builtin_prompt, list_prompts, load_prompt, BUILTIN_PROMPTS};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec,
    PromptSource,
};

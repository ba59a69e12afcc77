//! Command handlers for the Insight CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod analyze;
pub mod assist;
pub mod clear;
pub mod chat;
pub mod ingest;
pub mod prompts;
pub mod record;
pub mod search;

// Re-export command types for convenience
pub use analyze::AnalyzeCommand;
pub use assist::AssistCommand;
pub use clear::ClearCommand;
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use prompts::PromptsCommand;
pub use record::RecordCommand;
pub use search::SearchCommand;

use insight_core::{AppError, AppResult};
use serde::Serialize;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

/// Text from the positional argument, `--file`, or piped stdin, in that order.
pub(crate) fn read_input(text: &Option<String>, file: &Option<PathBuf>) -> AppResult<String> {
    if let Some(text) = text {
        return Ok(text.clone());
    }

    if let Some(path) = file {
        tracing::debug!("Reading input from {:?}", path);
        return std::fs::read_to_string(path).map_err(|e| {
            AppError::InvalidArgument(format!("Failed to read {:?}: {}", path, e))
        });
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(AppError::InvalidArgument(
            "No input provided: pass TEXT, --file, or pipe text on stdin".to_string(),
        ));
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    Ok(buffer)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}:", title);
    for item in items {
        println!("  - {}", item);
    }
}

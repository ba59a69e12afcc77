//! Analyze command handler.
//!
//! Extracts structured insight from a conversation without storing it.

use super::{print_json, print_list, read_input};
use clap::Args;
use insight_agent::{AnalysisOutcome, InsightService};
use insight_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Extract requirements, recommendations and a summary from a conversation
#[derive(Args, Debug)]
pub struct AnalyzeCommand {
    /// Conversation text (reads --file or stdin when omitted)
    pub text: Option<String>,

    /// Read the conversation from a file
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AnalyzeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing analyze command");

        let text = read_input(&self.text, &self.file)?;
        let service = InsightService::from_config(config).await?;
        let outcome = service.analyze_text(&text).await?;

        if self.json {
            print_json(&outcome)
        } else {
            print_outcome(&outcome);
            Ok(())
        }
    }
}

pub(crate) fn print_outcome(outcome: &AnalysisOutcome) {
    let result = &outcome.result;
    if !result.summary.is_empty() {
        println!("Summary: {}", result.summary);
    }
    if let Some(sentiment) = &result.sentiment {
        println!("Sentiment: {}", sentiment);
    }
    print_list("Requirements", &result.requirements);
    print_list("Recommendations", &result.recommendations);
    print_list("Key points", &result.key_points);
    print_list("Action items", &result.action_items);

    if outcome.is_partial() {
        println!();
        println!(
            "Warning: {} of {} segment(s) could not be analysed:",
            outcome.failures.len(),
            outcome.segment_count
        );
        for failure in &outcome.failures {
            println!("  - segment {} ({}): {}", failure.index, failure.kind, failure.message);
        }
    }
}

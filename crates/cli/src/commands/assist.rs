//! Assist command handler.

use super::{print_json, print_list, read_input};
use clap::Args;
use insight_agent::InsightService;
use insight_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Suggest next steps for a salesperson from a customer conversation
#[derive(Args, Debug)]
pub struct AssistCommand {
    /// Conversation text (reads --file or stdin when omitted)
    pub text: Option<String>,

    /// Read the conversation from a file
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AssistCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing assist command");

        let text = read_input(&self.text, &self.file)?;
        let service = InsightService::from_config(config).await?;
        let assistance = service.help_salesperson(&text).await?;

        if self.json {
            return print_json(&assistance);
        }

        print_list("Requirements", &assistance.requirements.requirements);
        if let Some(budget) = &assistance.requirements.budget {
            println!("Budget: {}", budget);
        }
        if let Some(timeline) = &assistance.requirements.timeline {
            println!("Timeline: {}", timeline);
        }
        println!();
        print_list("Recommendations", &assistance.recommendations);
        println!();
        if assistance.no_precedent {
            println!("No similar past cases were found.");
        } else {
            println!("Based on {} similar past case(s).", assistance.similar_case_count);
        }
        Ok(())
    }
}

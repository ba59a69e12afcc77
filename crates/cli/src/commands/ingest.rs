//! Ingest command handler.

use super::analyze::print_outcome;
use super::{print_json, read_input};
use clap::Args;
use insight_agent::{IngestRequest, InsightService};
use insight_core::{config::AppConfig, AppResult};
use insight_knowledge::SourceKind;
use std::path::PathBuf;

/// Analyse a conversation and store it in the knowledge index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Conversation text (reads --file or stdin when omitted)
    pub text: Option<String>,

    /// Read the text from a file (already extracted or transcribed)
    #[arg(short, long, conflicts_with = "text")]
    pub file: Option<PathBuf>,

    /// Where the text came from (text, audio, file)
    #[arg(long, default_value = "text")]
    pub kind: SourceKind,

    /// Record id; re-using an id overwrites that record
    #[arg(long)]
    pub id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command ({})", self.kind);

        let text = read_input(&self.text, &self.file)?;
        let mut request = IngestRequest::new(text, self.kind);
        if let Some(id) = &self.id {
            request = request.with_id(id.clone());
        }

        let service = InsightService::from_config(config).await?;
        let report = service.ingest(request).await?;

        if self.json {
            return print_json(&report);
        }

        if report.deduplicated {
            println!("Updated record {} (same text was already stored)", report.id);
        } else {
            println!("Stored record {}", report.id);
        }
        println!();
        print_outcome(&report.outcome);
        Ok(())
    }
}

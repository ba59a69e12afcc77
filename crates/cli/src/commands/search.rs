//! Search command handler.

use super::print_json;
use clap::Args;
use insight_agent::InsightService;
use insight_core::{config::AppConfig, AppResult};

/// Find stored conversations similar to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of records to return
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let service = InsightService::from_config(config).await?;
        let mut hits = service.search(&self.query, self.top_k).await?;

        if self.json {
            for hit in &mut hits {
                hit.record.vector.clear();
            }
            return print_json(&hits);
        }

        if hits.is_empty() {
            println!("No matching records.");
            return Ok(());
        }
        for (rank, hit) in hits.iter().enumerate() {
            let summary = hit
                .record
                .metadata
                .get("summary")
                .and_then(|s| s.as_str())
                .unwrap_or("");
            println!(
                "{}. {} (score {:.3}, {}, {})",
                rank + 1,
                hit.record.id,
                hit.score,
                hit.record.source_kind,
                hit.record.created_at.format("%Y-%m-%d %H:%M")
            );
            if !summary.is_empty() {
                println!("   {}", summary);
            }
        }
        Ok(())
    }
}

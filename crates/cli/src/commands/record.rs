//! Record command handler.

use super::print_json;
use clap::Args;
use insight_agent::InsightService;
use insight_core::{config::AppConfig, AppResult};

/// Show a stored record
#[derive(Args, Debug)]
pub struct RecordCommand {
    /// Record id
    pub id: String,

    /// Include the embedding vector
    #[arg(long, conflicts_with = "delete")]
    pub with_vector: bool,

    /// Remove the record from the index instead of showing it
    #[arg(long)]
    pub delete: bool,
}

impl RecordCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing record command for '{}'", self.id);

        let service = InsightService::from_config(config).await?;
        if self.delete {
            service.delete_record(&self.id).await?;
            println!("Deleted record '{}'", self.id);
            return Ok(());
        }

        let mut record = service.get_record(&self.id).await?;
        if !self.with_vector {
            record.vector.clear();
        }
        print_json(&record)
    }
}

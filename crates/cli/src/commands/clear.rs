//! Clear command handler.

use clap::Args;
use insight_agent::InsightService;
use insight_core::{config::AppConfig, AppError, AppResult};

/// Remove every stored record from the index
#[derive(Args, Debug)]
pub struct ClearCommand {
    /// Confirm the removal
    #[arg(long)]
    pub yes: bool,
}

impl ClearCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::InvalidArgument(
                "refusing to clear the index without --yes".to_string(),
            ));
        }

        let service = InsightService::from_config(config).await?;
        let removed = service.clear_index().await?;
        println!("Removed {} record(s)", removed);
        Ok(())
    }
}

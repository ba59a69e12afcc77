//! Prompts command handler.

use super::print_json;
use clap::Args;
use insight_core::{config::AppConfig, AppResult};
use insight_prompt::{list_prompts, load_prompt, PromptSource};

/// List prompt definitions and their overrides
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the resolved definition of one prompt
    #[arg(long, value_name = "ID")]
    pub show: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        if let Some(id) = &self.show {
            let (definition, source) = load_prompt(&config.workspace, id)?;
            if self.json {
                return print_json(&definition);
            }
            println!("{} ({}, {})", definition.id, definition.title, source_label(source));
            if let Some(system) = &definition.system {
                println!("\n[system]\n{}", system.trim_end());
            }
            println!("\n[template]\n{}", definition.template.trim_end());
            return Ok(());
        }

        let prompts = list_prompts(&config.workspace)?;
        if self.json {
            let listing: Vec<_> = prompts
                .iter()
                .map(|(id, source)| serde_json::json!({ "id": id, "source": source }))
                .collect();
            return print_json(&listing);
        }
        for (id, source) in prompts {
            println!("{:<24} {}", id, source_label(source));
        }
        Ok(())
    }
}

fn source_label(source: PromptSource) -> &'static str {
    match source {
        PromptSource::Builtin => "built-in",
        PromptSource::Workspace => "workspace override",
    }
}

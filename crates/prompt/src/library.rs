//! The resolved set of prompts an engine instance renders from.

use crate::builder::build_prompt;
use crate::loader::{load_prompt, BUILTIN_PROMPTS};
use crate::types::{BuiltPrompt, PromptDefinition, PromptSource};
use insight_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// Ids of the prompts the engine renders.
pub mod ids {
    pub const ANALYSIS_EXTRACT: &str = "analysis.extract";
    pub const AGENT_REACT: &str = "agent.react";
    pub const AGENT_FORCE_ANSWER: &str = "agent.force_answer";
    pub const SALES_REQUIREMENTS: &str = "sales.requirements";
    pub const SALES_RECOMMEND: &str = "sales.recommend";
}

/// Built-in definitions with any workspace overrides applied, resolved once.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<String, (PromptDefinition, PromptSource)>,
}

impl PromptLibrary {
    /// Resolve every built-in id against the workspace's override directory.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut prompts = HashMap::new();
        for (id, _) in BUILTIN_PROMPTS {
            let resolved = load_prompt(workspace_path, id)?;
            if resolved.1 == PromptSource::Workspace {
                tracing::info!(prompt = id, "Using workspace prompt override");
            }
            prompts.insert(id.to_string(), resolved);
        }
        Ok(Self { prompts })
    }

    /// Built-in definitions only.
    pub fn builtin() -> AppResult<Self> {
        let mut prompts = HashMap::new();
        for (id, _) in BUILTIN_PROMPTS {
            let definition = crate::loader::builtin_prompt(id)?;
            prompts.insert(id.to_string(), (definition, PromptSource::Builtin));
        }
        Ok(Self { prompts })
    }

    pub fn get(&self, id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(id)
            .map(|(definition, _)| definition)
            .ok_or_else(|| AppError::Prompt(format!("Prompt not loaded: {}", id)))
    }

    pub fn source(&self, id: &str) -> Option<PromptSource> {
        self.prompts.get(id).map(|(_, source)| *source)
    }

    /// Render a prompt by id.
    pub fn render<I, K, V>(&self, id: &str, variables: I) -> AppResult<BuiltPrompt>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let variables = variables
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        build_prompt(self.get(id)?, variables)
    }
}

//! Prompt loader for built-in and workspace YAML prompt definitions.

use crate::types::{PromptDefinition, PromptSource};
use insight_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Prompt definitions compiled into the binary, keyed by id.
pub const BUILTIN_PROMPTS: [(&str, &str); 5] = [
    (
        "analysis.extract",
        include_str!("../prompts/analysis.extract.yml"),
    ),
    ("agent.react", include_str!("../prompts/agent.react.yml")),
    (
        "agent.force_answer",
        include_str!("../prompts/agent.force_answer.yml"),
    ),
    (
        "sales.requirements",
        include_str!("../prompts/sales.requirements.yml"),
    ),
    (
        "sales.recommend",
        include_str!("../prompts/sales.recommend.yml"),
    ),
];

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".insight/prompts")
}

/// Parse one of the built-in definitions.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown built-in prompt: {}", prompt_id)))?;

    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse built-in prompt {}: {}",
            prompt_id, e
        ))
    })?;
    validate_prompt(&definition)?;
    Ok(definition)
}

/// Load a prompt definition by ID.
///
/// A workspace file `.insight/prompts/<id>.yml` takes precedence over the
/// built-in definition with the same id.
///
/// # Example
/// ```no_run
/// use insight_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (prompt, source) = load_prompt(Path::new("."), "agent.react")?;
/// println!("Loaded prompt: {} ({:?})", prompt.title, source);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(
    workspace_path: &Path,
    prompt_id: &str,
) -> AppResult<(PromptDefinition, PromptSource)> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        return builtin_prompt(prompt_id).map(|def| (def, PromptSource::Builtin));
    }

    tracing::debug!("Loading prompt override from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok((definition, PromptSource::Workspace))
}

/// List every available prompt id, sorted, with where it resolves from.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<(String, PromptSource)>> {
    let mut prompts: Vec<(String, PromptSource)> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| (id.to_string(), PromptSource::Builtin))
        .collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("yml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match prompts.iter_mut().find(|(id, _)| id == stem) {
                Some(existing) => existing.1 = PromptSource::Workspace,
                None => prompts.push((stem.to_string(), PromptSource::Workspace)),
            }
        }
    }

    prompts.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(prompts)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Prompt apiVersion cannot be empty".to_string(),
        ));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use insight_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the system instruction and the template are rendered with the same
/// variables. Missing variables render as empty strings, so optional
/// sections can be guarded with `{{#if name}}`.
///
/// # Example
/// ```no_run
/// use insight_prompt::{build_prompt, builtin_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt("analysis.extract")?;
/// let mut vars = HashMap::new();
/// vars.insert("text".to_string(), "We need SSO by March.".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|system| render_template(system, &variables))
        .transpose()?
        .map(|system| system.trim().to_string())
        .filter(|system| !system.is_empty());

    Ok(BuiltPrompt::new(
        system,
        user,
        &definition.behavior,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

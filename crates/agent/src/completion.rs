//! Sends rendered prompts through the completion contract.

use insight_core::AppResult;
use insight_llm::{LlmClient, LlmRequest};
use insight_prompt::BuiltPrompt;
use std::sync::Arc;

/// A completion client bound to the model every request should use.
#[derive(Clone)]
pub struct Completion {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .finish()
    }
}

impl Completion {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Complete a rendered prompt, returning the generated text.
    pub async fn complete(&self, prompt: BuiltPrompt) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt.user, self.model.clone());
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = prompt.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = prompt.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(&request).await?;
        tracing::debug!(
            prompt = %prompt.metadata.source_prompt_id,
            total_tokens = response.usage.total_tokens,
            "Completion received ({} chars)",
            response.content.len()
        );
        Ok(response.content)
    }
}

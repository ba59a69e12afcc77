//! LLM provider factory.
//!
//! Resolves a provider name plus configuration into a ready client. Clients
//! built from [`AppConfig`] are always wrapped in the retry policy.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::retry::{ResilientClient, RetryPolicy};
use crate::types::ProviderType;
use insight_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required by hosted providers
/// * `timeout` - HTTP timeout for a single request
///
/// # Errors
/// `AppError::Config` if the provider is unknown or a required secret is
/// missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;
    let base_url = endpoint.unwrap_or_else(|| provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_timeout(base_url, timeout)?)),
        ProviderType::OpenAI => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            Ok(Arc::new(OpenAiClient::with_options(base_url, api_key, timeout)?))
        }
    }
}

/// Build the configured completion client, wrapped with retries.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let policy = RetryPolicy::from(&config.engine.retry);
    let endpoint = config.provider_endpoint();
    let api_key = config.resolve_api_key(&config.provider);

    let client = create_client(
        &config.provider,
        endpoint.as_deref(),
        api_key.as_deref(),
        policy.attempt_timeout,
    )?;

    tracing::debug!(
        provider = %config.provider,
        model = %config.model,
        max_attempts = policy.max_attempts,
        "Created LLM client"
    );

    Ok(Arc::new(ResilientClient::new(client, policy)))
}

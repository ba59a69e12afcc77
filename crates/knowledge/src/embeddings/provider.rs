//! Embedding provider trait and factory.

use insight_core::config::EmbeddingConfig;
use insight_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
///
/// Vectors returned by one provider always have [`dimensions`] entries.
///
/// [`dimensions`]: EmbeddingProvider::dimensions
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results.pop().ok_or_else(|| {
            AppError::external(self.provider_name(), "no embedding returned", false)
        })
    }
}

/// Create an embedding provider based on configuration.
///
/// The returned provider performs single attempts; wrap it in
/// [`ResilientEmbedder`](super::ResilientEmbedder) for retries.
pub fn create_provider(
    config: &EmbeddingConfig,
    api_key: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(AppError::Config(
            "Embedding dimensions must be greater than zero".to_string(),
        ));
    }

    match config.provider.to_lowercase().as_str() {
        "mock" => {
            let provider = super::providers::MockProvider::new(config.dimensions);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::OllamaProvider::new(
                config.endpoint.as_deref(),
                &config.model,
                config.dimensions,
                timeout,
            )?;
            Ok(Arc::new(provider))
        }

        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI embedding provider requires an API key".to_string())
            })?;
            let provider = super::providers::OpenAiProvider::new(
                api_key,
                config.endpoint.as_deref(),
                &config.model,
                config.dimensions,
                timeout,
            )?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: mock, ollama, openai",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_create_mock_provider() {
        let config = EmbeddingConfig::default();

        let provider = create_provider(&config, None, TIMEOUT).unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_ollama_provider() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            ..Default::default()
        };
        let provider = create_provider(&config, None, TIMEOUT).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.dimensions(), 768);
    }

    #[test]
    fn test_openai_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&config, None, TIMEOUT),
            Err(AppError::Config(_))
        ));
        assert!(create_provider(&config, Some("sk-test"), TIMEOUT).is_ok());
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config, None, TIMEOUT);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let config = EmbeddingConfig::default();
        let provider = create_provider(&config, None, TIMEOUT).unwrap();

        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}

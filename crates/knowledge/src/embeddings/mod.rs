//! Embedding providers and the retrying wrapper used by the engine.

pub mod provider;
pub mod providers;

pub use insight_core::config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use insight_core::{AppConfig, AppError, AppResult};
use insight_llm::{retry_with_backoff, RetryPolicy};
use std::sync::Arc;

/// Wraps a provider with batching, the retry policy and dimension checks.
#[derive(Debug)]
pub struct ResilientEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl ResilientEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, policy: RetryPolicy, batch_size: usize) -> Self {
        Self {
            inner,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    fn check_vectors(&self, expected_count: usize, vectors: &[Vec<f32>]) -> AppResult<()> {
        if vectors.len() != expected_count {
            return Err(AppError::external(
                self.inner.provider_name(),
                format!("returned {} embeddings for {} inputs", vectors.len(), expected_count),
                false,
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.inner.dimensions()) {
            return Err(AppError::DimensionMismatch {
                expected: self.inner.dimensions(),
                actual: bad.len(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for ResilientEmbedder {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let label = format!("{}.embed", self.inner.provider_name());
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let vectors =
                retry_with_backoff(&self.policy, &label, || self.inner.embed_batch(batch)).await?;
            self.check_vectors(batch.len(), &vectors)?;
            embeddings.extend(vectors);
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            embeddings.len(),
            self.inner.dimensions()
        );

        Ok(embeddings)
    }
}

/// Build the configured embedding provider, wrapped with retries.
pub fn provider_from_config(config: &AppConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let settings = &config.engine.embedding;
    let policy = RetryPolicy::from(&config.engine.retry);
    let api_key = config.resolve_embedding_api_key();

    let provider = create_provider(settings, api_key.as_deref(), policy.attempt_timeout)?;

    tracing::debug!(
        "Creating embedding provider: provider={}, model={}, dimensions={}",
        settings.provider,
        settings.model,
        settings.dimensions
    );

    Ok(Arc::new(ResilientEmbedder::new(
        provider,
        policy,
        settings.batch_size,
    )))
}

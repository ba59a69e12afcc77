//! OpenAI-compatible embeddings provider (`POST {base}/embeddings`).

use crate::embeddings::EmbeddingProvider;
use insight_core::{AppError, AppResult};
use insight_llm::providers::{request_error, status_error};
use insight_llm::ProviderType;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "openai-embeddings";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiProvider {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config("missing OpenAI API key".to_string()));
        }
        if model.trim().is_empty() {
            return Err(AppError::Config("missing OpenAI embedding model".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| AppError::Config("invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build OpenAI HTTP client: {}", e)))?;

        let base_url = base_url.unwrap_or_else(|| ProviderType::OpenAI.default_endpoint());
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimensions,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimensions,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(status_error(SERVICE, status, &body));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::external(SERVICE, format!("failed to parse embedding response: {}", e), false)
        })?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(AppError::external(
                SERVICE,
                format!(
                    "returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
                false,
            ));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

mod service_flow;

use crate::completion::Completion;
use crate::{InMemorySessionStore, InsightService, ServiceParts};
use insight_core::config::EngineConfig;
use insight_core::{AppError, AppResult};
use insight_knowledge::embeddings::providers::MockProvider;
use insight_knowledge::{EmbeddingIndex, EmbeddingProvider, SqliteIndex};
use insight_llm::{LlmRequest, ScriptedClient};
use insight_prompt::PromptLibrary;
use std::sync::Arc;

pub(crate) const DIM: usize = 384;

/// Which built-in prompt a request was rendered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromptKind {
    Extract,
    React,
    ForceAnswer,
    Requirements,
    Recommend,
}

pub(crate) fn prompt_kind(request: &LlmRequest) -> PromptKind {
    let prompt = &request.prompt;
    if prompt.contains("You have used all available searches") {
        PromptKind::ForceAnswer
    } else if prompt.contains("You can use one tool") {
        PromptKind::React
    } else if prompt.contains("extract structured insight") {
        PromptKind::Extract
    } else if prompt.contains("Customer requirements:") {
        PromptKind::Recommend
    } else {
        PromptKind::Requirements
    }
}

pub(crate) fn analysis_json(requirements: &[&str], summary: &str) -> String {
    serde_json::json!({
        "requirements": requirements,
        "recommendations": ["Schedule a technical demo"],
        "summary": summary,
        "key_points": [],
        "action_items": ["Send pricing"],
        "sentiment": "positive"
    })
    .to_string()
}

pub(crate) fn library() -> Arc<PromptLibrary> {
    Arc::new(PromptLibrary::builtin().unwrap())
}

pub(crate) fn completion(llm: &Arc<ScriptedClient>) -> Completion {
    Completion::new(llm.clone(), "test-model")
}

pub(crate) fn mock_embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(MockProvider::new(DIM))
}

/// Embedding service that is always down.
#[derive(Debug)]
pub(crate) struct DownEmbedder;

#[async_trait::async_trait]
impl EmbeddingProvider for DownEmbedder {
    fn provider_name(&self) -> &str {
        "down"
    }

    fn model_name(&self) -> &str {
        "down-v1"
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::external("down", "connection refused", true))
    }
}

pub(crate) struct Fixture {
    pub llm: Arc<ScriptedClient>,
    pub index: Arc<SqliteIndex>,
    pub sessions: Arc<InMemorySessionStore>,
    pub service: InsightService,
}

pub(crate) fn fixture_with(llm: ScriptedClient, engine: EngineConfig) -> Fixture {
    let llm = Arc::new(llm);
    let index = Arc::new(SqliteIndex::open_in_memory(DIM).unwrap());
    let sessions = Arc::new(InMemorySessionStore::new());
    let service = InsightService::new(ServiceParts {
        llm: llm.clone(),
        model: "test-model".to_string(),
        prompts: library(),
        embedder: mock_embedder(),
        index: index.clone() as Arc<dyn EmbeddingIndex>,
        sessions: sessions.clone(),
        engine,
    })
    .unwrap();
    Fixture {
        llm,
        index,
        sessions,
        service,
    }
}

pub(crate) fn fixture(llm: ScriptedClient) -> Fixture {
    fixture_with(llm, EngineConfig::default())
}

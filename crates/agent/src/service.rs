//! The engine's exposed operations behind one façade.

use crate::agent::{AgentOrchestrator, ChatReply, SessionStore, SqliteSessionStore};
use crate::analysis::{AnalysisOutcome, AnalysisPipeline};
use crate::completion::Completion;
use crate::sales::{SalesAssistOrchestrator, SalesAssistance};
use insight_core::config::EngineConfig;
use insight_core::{AppConfig, AppError, AppResult};
use insight_knowledge::{
    content_hash, provider_from_config, ChunkConfig, Chunker, EmbeddingIndex, EmbeddingProvider,
    Record, SearchHit, SourceKind, SqliteIndex,
};
use insight_llm::{client_from_config, LlmClient};
use insight_prompt::PromptLibrary;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Text to analyse and store.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub text: String,
    #[serde(default)]
    pub source_kind: SourceKind,
    /// Caller-chosen record id; re-using an id overwrites that record
    #[serde(default)]
    pub id: Option<String>,
}

impl IngestRequest {
    pub fn new(text: impl Into<String>, source_kind: SourceKind) -> Self {
        Self {
            text: text.into(),
            source_kind,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub id: String,
    pub outcome: AnalysisOutcome,
    /// An existing record with identical text was overwritten
    pub deduplicated: bool,
}

/// Collaborators of an [`InsightService`], for callers wiring their own.
pub struct ServiceParts {
    pub llm: Arc<dyn LlmClient>,
    pub model: String,
    pub prompts: Arc<PromptLibrary>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn EmbeddingIndex>,
    pub sessions: Arc<dyn SessionStore>,
    pub engine: EngineConfig,
}

/// Analysis, storage, search, chat and sales assistance over one index.
pub struct InsightService {
    analysis: AnalysisPipeline,
    agent: AgentOrchestrator,
    sales: SalesAssistOrchestrator,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn EmbeddingIndex>,
}

impl std::fmt::Debug for InsightService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightService")
            .field("analysis", &self.analysis)
            .field("agent", &self.agent)
            .field("sales", &self.sales)
            .field("dimension", &self.index.dimension())
            .finish()
    }
}

impl InsightService {
    /// Assemble a service from injected collaborators.
    ///
    /// `Config` when the engine settings are unusable, `DimensionMismatch`
    /// when the embedder and the index disagree.
    pub fn new(parts: ServiceParts) -> AppResult<Self> {
        parts.engine.validate()?;
        if parts.embedder.dimensions() != parts.index.dimension() {
            return Err(AppError::DimensionMismatch {
                expected: parts.index.dimension(),
                actual: parts.embedder.dimensions(),
            });
        }

        let completion = Completion::new(parts.llm, parts.model);
        let chunker = Chunker::new(ChunkConfig::from(&parts.engine.chunking))?;

        Ok(Self {
            analysis: AnalysisPipeline::new(
                completion.clone(),
                Arc::clone(&parts.prompts),
                chunker,
                parts.engine.analysis.clone(),
            ),
            agent: AgentOrchestrator::new(
                completion.clone(),
                Arc::clone(&parts.prompts),
                Arc::clone(&parts.embedder),
                Arc::clone(&parts.index),
                parts.sessions,
                parts.engine.agent.clone(),
            ),
            sales: SalesAssistOrchestrator::new(
                completion,
                parts.prompts,
                Arc::clone(&parts.embedder),
                Arc::clone(&parts.index),
                parts.engine.sales.clone(),
            ),
            embedder: parts.embedder,
            index: parts.index,
        })
    }

    /// Wire the configured providers, the SQLite index and the SQLite
    /// session store sharing its database.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let llm = client_from_config(config)?;
        let prompts = Arc::new(PromptLibrary::load(&config.workspace)?);
        let embedder = provider_from_config(config)?;
        let index = SqliteIndex::from_config(
            &config.engine.index,
            &config.index_path(),
            embedder.dimensions(),
        )?;
        let sessions = SqliteSessionStore::new(index.shared_connection()).await?;

        tracing::info!(
            provider = %config.provider,
            model = %config.model,
            embedding = %embedder.provider_name(),
            index = %index.location(),
            "Insight service ready"
        );

        Self::new(ServiceParts {
            llm,
            model: config.model.clone(),
            prompts,
            embedder,
            index: Arc::new(index),
            sessions: Arc::new(sessions),
            engine: config.engine.clone(),
        })
    }

    pub async fn analyze_text(&self, text: &str) -> AppResult<AnalysisOutcome> {
        self.analysis.analyze(text).await
    }

    /// Analyse, embed and store a text.
    ///
    /// Without a caller id, a record holding the same text is overwritten
    /// instead of duplicated.
    pub async fn ingest(&self, request: IngestRequest) -> AppResult<IngestReport> {
        if let Some(id) = &request.id {
            if id.trim().is_empty() {
                return Err(AppError::InvalidArgument("record id must not be empty".to_string()));
            }
        }

        let outcome = self.analysis.analyze(&request.text).await?;
        let vector = self.embedder.embed(&request.text).await?;

        let (id, deduplicated) = match request.id {
            Some(id) => (Some(id), false),
            None => match self
                .index
                .find_by_content_hash(&content_hash(&request.text))
                .await?
            {
                Some(existing) => (Some(existing), true),
                None => (None, false),
            },
        };

        let metadata = serde_json::to_value(&outcome.result)?;
        let record = Record::new(id, request.text, vector, metadata, request.source_kind);
        let id = record.id.clone();
        self.index.store(record).await?;

        tracing::info!(
            id = %id,
            segments = outcome.segment_count,
            dropped = outcome.failures.len(),
            deduplicated,
            "Ingested {} record",
            request.source_kind
        );

        Ok(IngestReport {
            id,
            outcome,
            deduplicated,
        })
    }

    /// Records most similar to a free-text query.
    pub async fn search(&self, query: &str, top_k: usize) -> AppResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidArgument("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(AppError::InvalidArgument("top_k must be at least 1".to_string()));
        }
        let vector = self.embedder.embed(query).await?;
        self.index.search(&vector, top_k).await
    }

    pub async fn get_record(&self, id: &str) -> AppResult<Record> {
        self.index.get_by_id(id).await
    }

    /// Remove one stored record; `NotFound` when no record has this id.
    pub async fn delete_record(&self, id: &str) -> AppResult<()> {
        if !self.index.delete(id).await? {
            return Err(AppError::NotFound(format!("record '{}'", id)));
        }
        tracing::info!(id = %id, "Deleted record");
        Ok(())
    }

    /// Remove every stored record. Chat sessions are kept.
    pub async fn clear_index(&self) -> AppResult<usize> {
        let removed = self.index.count().await?;
        self.index.reset().await?;
        Ok(removed)
    }

    pub async fn chat(&self, session_id: &str, message: &str) -> AppResult<ChatReply> {
        self.agent.chat(session_id, message).await
    }

    pub async fn reset_session(&self, session_id: &str) -> AppResult<bool> {
        self.agent.reset(session_id).await
    }

    pub async fn help_salesperson(&self, text: &str) -> AppResult<SalesAssistance> {
        self.sales.assist(text).await
    }

    pub fn index(&self) -> &Arc<dyn EmbeddingIndex> {
        &self.index
    }
}

//! End-to-end operations through the service façade.

use super::*;
use crate::service::IngestRequest;
use crate::SqliteSessionStore;
use insight_core::{AppConfig, AppError};
use insight_knowledge::SourceKind;
use tempfile::TempDir;

fn analysing_client() -> ScriptedClient {
    ScriptedClient::with_responder(|request| {
        Ok(match prompt_kind(request) {
            PromptKind::Extract => analysis_json(&["single sign-on"], "Customer wants SSO"),
            _ => "Final Answer: ok".to_string(),
        })
    })
}

const ACME: &str = "Acme Corp needs single sign-on and audit logging for 200 users.";

#[tokio::test]
async fn test_ingest_then_search_finds_record() {
    let fx = fixture(analysing_client());

    let report = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::Text))
        .await
        .unwrap();
    fx.service
        .ingest(IngestRequest::new(
            "The weather in Lisbon was sunny and warm all week.",
            SourceKind::Audio,
        ))
        .await
        .unwrap();

    assert!(!report.deduplicated);
    assert_eq!(report.outcome.result.summary, "Customer wants SSO");

    let hits = fx
        .service
        .search("single sign-on and audit logging", 2)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.id, report.id);
    assert!(hits[0].score >= hits[1].score);

    let record = fx.service.get_record(&report.id).await.unwrap();
    assert_eq!(record.text, ACME);
    assert_eq!(record.source_kind, SourceKind::Text);
    assert_eq!(record.metadata["requirements"][0], "single sign-on");
}

const CRM_CALL: &str = "Client wants 100 user CRM licenses, $5000 budget, mobile access required.";

#[tokio::test]
async fn test_crm_call_is_top_hit_for_related_query() {
    let fx = fixture(ScriptedClient::with_responder(|request| {
        Ok(match prompt_kind(request) {
            PromptKind::Extract => analysis_json(
                &["100 CRM licenses", "mobile access"],
                "Client needs a CRM for 100 users",
            ),
            _ => "Final Answer: ok".to_string(),
        })
    }));

    let report = fx
        .service
        .ingest(IngestRequest::new(CRM_CALL, SourceKind::Text))
        .await
        .unwrap();
    for other in [ACME, "The weather in Lisbon was sunny and warm all week."] {
        fx.service
            .ingest(IngestRequest::new(other, SourceKind::Text))
            .await
            .unwrap();
    }

    let hits = fx.service.search("CRM for 100 users", 5).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].record.id, report.id);
    assert_eq!(hits[0].record.text, CRM_CALL);
    assert_eq!(hits[0].record.metadata["requirements"][1], "mobile access");
}

#[tokio::test]
async fn test_reingesting_same_text_overwrites() {
    let fx = fixture(analysing_client());

    let first = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::Text))
        .await
        .unwrap();
    let second = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::File))
        .await
        .unwrap();

    assert!(second.deduplicated);
    assert_eq!(second.id, first.id);
    assert_eq!(fx.index.count().await.unwrap(), 1);
    assert_eq!(
        fx.service.get_record(&first.id).await.unwrap().source_kind,
        SourceKind::File
    );
}

#[tokio::test]
async fn test_caller_id_is_respected() {
    let fx = fixture(analysing_client());

    fx.service
        .ingest(IngestRequest::new(ACME, SourceKind::Text))
        .await
        .unwrap();
    let report = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::Text).with_id("acme-call-2"))
        .await
        .unwrap();

    assert_eq!(report.id, "acme-call-2");
    assert!(!report.deduplicated);
    assert_eq!(fx.index.count().await.unwrap(), 2);

    let err = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::Text).with_id("  "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_failed_analysis_stores_nothing() {
    let fx = fixture(ScriptedClient::with_responder(|_| Ok("not json".to_string())));

    let err = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::Text))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MalformedResponse(_)));
    assert_eq!(fx.index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_search_argument_errors() {
    let fx = fixture(analysing_client());

    let err = fx.service.search("anything", 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    let err = fx.service.search("   ", 3).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert!(fx.service.search("anything", 3).await.unwrap().is_empty());

    let err = fx.service.get_record("missing").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_zero_top_k_is_rejected_before_embedding() {
    let service = InsightService::new(ServiceParts {
        llm: Arc::new(analysing_client()),
        model: "test-model".to_string(),
        prompts: library(),
        embedder: Arc::new(DownEmbedder),
        index: Arc::new(SqliteIndex::open_in_memory(DIM).unwrap()),
        sessions: Arc::new(InMemorySessionStore::new()),
        engine: EngineConfig::default(),
    })
    .unwrap();

    let err = service.search("anything", 0).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let err = service.search("anything", 1).await.unwrap_err();
    assert!(matches!(err, AppError::ExternalService { .. }));
}

#[tokio::test]
async fn test_invalid_engine_settings_are_rejected() {
    let mut engine = EngineConfig::default();
    engine.agent.search_top_k = 0;

    let result = InsightService::new(ServiceParts {
        llm: Arc::new(analysing_client()),
        model: "test-model".to_string(),
        prompts: library(),
        embedder: mock_embedder(),
        index: Arc::new(SqliteIndex::open_in_memory(DIM).unwrap()),
        sessions: Arc::new(InMemorySessionStore::new()),
        engine,
    });
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_delete_record_and_clear_index() {
    let fx = fixture(analysing_client());
    let kept = fx
        .service
        .ingest(IngestRequest::new(ACME, SourceKind::Text))
        .await
        .unwrap();
    let dropped = fx
        .service
        .ingest(IngestRequest::new(CRM_CALL, SourceKind::Text))
        .await
        .unwrap();

    fx.service.delete_record(&dropped.id).await.unwrap();
    assert!(matches!(
        fx.service.get_record(&dropped.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        fx.service.delete_record(&dropped.id).await,
        Err(AppError::NotFound(_))
    ));
    let hits = fx.service.search("CRM for 100 users", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, kept.id);

    assert_eq!(fx.service.clear_index().await.unwrap(), 1);
    assert!(fx.service.search("anything", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_embedder_and_index_must_agree() {
    let result = InsightService::new(ServiceParts {
        llm: Arc::new(analysing_client()),
        model: "test-model".to_string(),
        prompts: library(),
        embedder: Arc::new(MockProvider::new(16)),
        index: Arc::new(SqliteIndex::open_in_memory(DIM).unwrap()),
        sessions: Arc::new(InMemorySessionStore::new()),
        engine: EngineConfig::default(),
    });
    assert!(matches!(
        result,
        Err(AppError::DimensionMismatch {
            expected: DIM,
            actual: 16
        })
    ));
}

#[tokio::test]
async fn test_chat_over_persistent_store() {
    let dir = TempDir::new().unwrap();
    let index = SqliteIndex::open(&dir.path().join("index.sqlite"), DIM).unwrap();
    let sessions = SqliteSessionStore::new(index.shared_connection()).await.unwrap();
    let llm = Arc::new(ScriptedClient::new(["Final Answer: one", "Final Answer: two"]));

    let service = InsightService::new(ServiceParts {
        llm: llm.clone(),
        model: "test-model".to_string(),
        prompts: library(),
        embedder: mock_embedder(),
        index: Arc::new(index),
        sessions: Arc::new(sessions),
        engine: EngineConfig::default(),
    })
    .unwrap();

    service.chat("s1", "hello").await.unwrap();
    let reply = service.chat("s1", "again").await.unwrap();
    assert_eq!(reply.history_len, 4);
    assert!(llm.requests()[1].prompt.contains("Agent: one"));
}

#[tokio::test]
async fn test_from_config_wires_local_stack() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig {
        workspace: dir.path().to_path_buf(),
        ..Default::default()
    };

    let service = InsightService::from_config(&config).await.unwrap();

    assert!(config.index_path().exists());
    assert_eq!(service.index().dimension(), config.engine.embedding.dimensions);
    assert!(service.search("anything", 1).await.unwrap().is_empty());
    assert!(!service.reset_session("nobody").await.unwrap());
}

//! Tests for index ranking and consistency.

use crate::index::SqliteIndex;
use crate::types::{Record, SourceKind};
use crate::vector_index::EmbeddingIndex;
use chrono::{Duration, Utc};
use insight_core::AppError;
use std::sync::Arc;
use tempfile::TempDir;

/// Helper to create a normalized embedding.
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn record(id: &str, text: &str, vector: &[f32]) -> Record {
    Record::new(
        Some(id.to_string()),
        text,
        normalize(vector),
        serde_json::json!({}),
        SourceKind::Text,
    )
}

#[tokio::test]
async fn test_relevant_query_ranks_first() {
    let index = SqliteIndex::open_in_memory(4).unwrap();
    index
        .store(record("rust", "Rust is a systems programming language", &[1.0, 0.5, 0.2, 0.1]))
        .await
        .unwrap();
    index
        .store(record("pasta", "Cooking recipes for pasta", &[-0.3, -0.8, 0.4, -0.2]))
        .await
        .unwrap();

    let hits = index.search(&normalize(&[0.9, 0.4, 0.3, 0.1]), 5).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.id, "rust", "Most relevant record should be first");
    assert!(hits[0].score > 0.8, "Relevant score should be high: {}", hits[0].score);
    assert!(hits[0].score > hits[1].score, "Scores should be ordered");
}

#[tokio::test]
async fn test_self_query_is_top_hit() {
    let index = SqliteIndex::open_in_memory(4).unwrap();
    let vectors = [
        [1.0, 0.0, 0.0, 0.0],
        [0.7, 0.7, 0.0, 0.0],
        [0.0, 0.2, 0.9, 0.1],
        [0.1, 0.1, 0.1, 0.9],
    ];
    for (i, v) in vectors.iter().enumerate() {
        index.store(record(&format!("r{i}"), "text", v)).await.unwrap();
    }

    for (i, v) in vectors.iter().enumerate() {
        let hits = index.search(&normalize(v), 1).await.unwrap();
        assert_eq!(hits[0].record.id, format!("r{i}"));
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_scores_are_ordered_and_truncated() {
    let index = SqliteIndex::open_in_memory(3).unwrap();
    for (id, v) in [
        ("a", [1.0, 0.0, 0.0]),
        ("b", [0.8, 0.2, 0.0]),
        ("c", [0.5, 0.5, 0.0]),
        ("d", [0.0, 1.0, 0.0]),
    ] {
        index.store(record(id, id, &v)).await.unwrap();
    }

    let hits = index.search(&[1.0, 0.0, 0.0], 3).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_restore_same_id_keeps_one_record() {
    let index = SqliteIndex::open_in_memory(2).unwrap();
    index.store(record("dup", "first", &[1.0, 0.0])).await.unwrap();
    index.store(record("dup", "second", &[0.0, 1.0])).await.unwrap();

    assert_eq!(index.count().await.unwrap(), 1);
    let hits = index.search(&[0.0, 1.0], 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.text, "second");
}

#[tokio::test]
async fn test_empty_index_returns_no_hits() {
    let index = SqliteIndex::open_in_memory(2).unwrap();
    assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_top_k_is_invalid() {
    let index = SqliteIndex::open_in_memory(2).unwrap();
    assert!(matches!(
        index.search(&[1.0, 0.0], 0).await,
        Err(AppError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_deleted_record_is_gone_from_lookup_and_search() {
    let index = SqliteIndex::open_in_memory(2).unwrap();
    index.store(record("keep", "keep", &[1.0, 0.0])).await.unwrap();
    index.store(record("drop", "drop", &[0.9, 0.1])).await.unwrap();

    assert!(index.delete("drop").await.unwrap());
    assert!(!index.delete("drop").await.unwrap());

    assert!(matches!(
        index.get_by_id("drop").await,
        Err(AppError::NotFound(_))
    ));
    let hits = index.search(&[1.0, 0.0], 10).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, vec!["keep"]);
}

#[tokio::test]
async fn test_reset_empties_index_and_keeps_dimension() {
    let index = SqliteIndex::open_in_memory(2).unwrap();
    index.store(record("a", "a", &[1.0, 0.0])).await.unwrap();
    index.store(record("b", "b", &[0.0, 1.0])).await.unwrap();

    index.reset().await.unwrap();

    assert_eq!(index.count().await.unwrap(), 0);
    assert!(index.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    assert_eq!(index.dimension(), 2);
    index.store(record("c", "c", &[0.0, 1.0])).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_dimension_mismatch_on_store_and_search() {
    let index = SqliteIndex::open_in_memory(3).unwrap();

    let err = index.store(record("bad", "bad", &[1.0, 0.0])).await.unwrap_err();
    assert!(matches!(err, AppError::DimensionMismatch { expected: 3, actual: 2 }));

    let err = index.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap_err();
    assert!(matches!(err, AppError::DimensionMismatch { expected: 3, actual: 4 }));
    assert_eq!(index.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ties_prefer_most_recent_then_id() {
    let index = SqliteIndex::open_in_memory(2).unwrap();
    let now = Utc::now();

    let mut old = record("old", "old", &[1.0, 0.0]);
    old.created_at = now - Duration::hours(2);
    let mut new_b = record("b-new", "new", &[1.0, 0.0]);
    new_b.created_at = now;
    let mut new_a = record("a-new", "new", &[1.0, 0.0]);
    new_a.created_at = now;

    index.store(old).await.unwrap();
    index.store(new_b).await.unwrap();
    index.store(new_a).await.unwrap();

    let hits = index.search(&[1.0, 0.0], 3).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, vec!["a-new", "b-new", "old"]);
}

#[tokio::test]
async fn test_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");

    {
        let index = SqliteIndex::open(&path, 2).unwrap();
        index.store(record("kept", "kept text", &[0.6, 0.8])).await.unwrap();
    }

    let reopened = SqliteIndex::open(&path, 2).unwrap();
    let fetched = reopened.get_by_id("kept").await.unwrap();
    assert_eq!(fetched.text, "kept text");
    assert_eq!(fetched.source_kind, SourceKind::Text);
}

#[tokio::test]
async fn test_reopen_with_other_dimension_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("index.db");
    SqliteIndex::open(&path, 384).unwrap();

    assert!(matches!(
        SqliteIndex::open(&path, 1536),
        Err(AppError::DimensionMismatch { expected: 384, actual: 1536 })
    ));
}

#[tokio::test]
async fn test_concurrent_stores_to_different_ids() {
    let index = Arc::new(SqliteIndex::open_in_memory(2).unwrap());

    let tasks = (0..32).map(|i| {
        let index = Arc::clone(&index);
        async move {
            index
                .store(record(&format!("id-{i}"), "text", &[1.0, i as f32]))
                .await
        }
    });
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    assert_eq!(index.count().await.unwrap(), 32);
}

#[tokio::test]
async fn test_concurrent_stores_to_same_id_leave_one_complete_record() {
    let index = Arc::new(SqliteIndex::open_in_memory(2).unwrap());

    let mut handles = Vec::new();
    for i in 0..16 {
        let index = Arc::clone(&index);
        handles.push(tokio::spawn(async move {
            let text = format!("version {i}");
            index.store(record("shared", &text, &[1.0, i as f32])).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(index.count().await.unwrap(), 1);
    let stored = index.get_by_id("shared").await.unwrap();
    let version: usize = stored.text.trim_start_matches("version ").parse().unwrap();
    let expected = normalize(&[1.0, version as f32]);
    assert_eq!(stored.vector, expected);
}

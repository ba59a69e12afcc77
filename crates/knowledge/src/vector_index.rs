//! Embedding index abstraction.
//!
//! Defines a trait for provider-agnostic record storage and similarity
//! search, shared by reference across concurrent requests.

use crate::types::{Record, SearchHit};
use insight_core::AppResult;

/// Trait for embedding index backends.
///
/// Implementations must guarantee that:
/// - a store is visible to every search that starts after it returns
/// - concurrent stores to the same id leave exactly one complete record
/// - every vector has the index dimension
#[async_trait::async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Vector length every record and query must have.
    fn dimension(&self) -> usize;

    /// Insert or replace a record by id.
    ///
    /// `DimensionMismatch` when the vector length differs from the index
    /// dimension, `Unavailable` when the backing store cannot be reached.
    async fn store(&self, record: Record) -> AppResult<()>;

    /// The `top_k` records most similar to `query`, best first.
    ///
    /// Ties are broken by the most recent `created_at`, then by id.
    /// `top_k == 0` is `InvalidArgument`; an empty index yields no hits.
    async fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>>;

    /// `NotFound` when no record has this id.
    async fn get_by_id(&self, id: &str) -> AppResult<Record>;

    /// Id of the most recent record whose text hashes to `hash`.
    async fn find_by_content_hash(&self, hash: &str) -> AppResult<Option<String>>;

    async fn count(&self) -> AppResult<usize>;

    /// Remove a record; returns whether it existed.
    async fn delete(&self, id: &str) -> AppResult<bool>;

    /// Remove every record, keeping the dimension.
    async fn reset(&self) -> AppResult<()>;
}

//! Knowledge storage for the Insight engine.
//!
//! Provides text chunking, embedding providers, and a local-first
//! SQLite embedding index with cosine similarity search.

pub mod chunk;
pub mod embeddings;
pub mod index;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunk::{Chunker, ChunkConfig, Segment};
pub use embeddings::{create_provider, provider_from_config, EmbeddingProvider, ResilientEmbedder};
pub use index::{SharedConnection, SqliteIndex};
pub use types::{content_hash, Record, SearchHit, SourceKind};
pub use vector_index::EmbeddingIndex;

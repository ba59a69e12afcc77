//! SQLite-backed embedding index.
//!
//! Records live in one table with embeddings stored as little-endian f32
//! blobs; similarity is computed in process. The index dimension is fixed
//! when the database is created and persisted in `index_meta`.

use crate::types::{Record, SearchHit, SourceKind};
use crate::vector_index::EmbeddingIndex;
use chrono::{DateTime, SecondsFormat, Utc};
use insight_core::config::IndexConfig;
use insight_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A connection shared by every store living in the same database.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Run blocking database work off the async runtime.
///
/// The mutex serialises access, so each closure sees a consistent database.
pub async fn with_connection<T, F>(conn: &SharedConnection, op: F) -> AppResult<T>
where
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|_| AppError::Unavailable("database connection poisoned".to_string()))?;
        op(&mut guard)
    })
    .await
    .map_err(|e| AppError::Unavailable(format!("database task failed: {}", e)))?
}

/// Map a SQLite failure to `Unavailable` with context.
pub fn db_error(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Unavailable(format!("{}: {}", context, e))
}

/// Open a database file, creating parent directories.
pub fn open_connection(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(db_path).map_err(db_error("Failed to open SQLite database"))?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(db_error("Failed to configure SQLite database"))?;
    Ok(conn)
}

/// SQLite implementation of [`EmbeddingIndex`].
pub struct SqliteIndex {
    conn: SharedConnection,
    dimension: usize,
    location: String,
}

impl std::fmt::Debug for SqliteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("dimension", &self.dimension)
            .field("location", &self.location)
            .finish()
    }
}

impl SqliteIndex {
    /// Open or create a file-backed index.
    ///
    /// `DimensionMismatch` if the file was created with another dimension.
    pub fn open(db_path: &Path, dimension: usize) -> AppResult<Self> {
        let conn = open_connection(db_path)?;
        let index = Self::from_connection(conn, dimension, db_path.display().to_string())?;
        tracing::debug!("Opened SQLite index at {:?} (dimension {})", db_path, dimension);
        Ok(index)
    }

    /// Create a private in-memory index.
    pub fn open_in_memory(dimension: usize) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(db_error("Failed to open in-memory SQLite database"))?;
        Self::from_connection(conn, dimension, ":memory:".to_string())
    }

    /// Open according to configuration, defaulting to `default_path`.
    pub fn from_config(config: &IndexConfig, default_path: &Path, dimension: usize) -> AppResult<Self> {
        if config.in_memory {
            return Self::open_in_memory(dimension);
        }
        let path: PathBuf = config
            .path
            .clone()
            .unwrap_or_else(|| default_path.to_path_buf());
        Self::open(&path, dimension)
    }

    fn from_connection(conn: Connection, dimension: usize, location: String) -> AppResult<Self> {
        if dimension == 0 {
            return Err(AppError::InvalidArgument(
                "index dimension must be greater than zero".to_string(),
            ));
        }
        init_schema(&conn, dimension)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimension,
            location,
        })
    }

    /// The underlying connection, for stores sharing the database.
    pub fn shared_connection(&self) -> SharedConnection {
        Arc::clone(&self.conn)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn check_dimension(&self, actual: usize) -> AppResult<()> {
        if actual != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }
}

fn init_schema(conn: &Connection, dimension: usize) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            metadata TEXT NOT NULL,
            source_kind TEXT NOT NULL,
            created_at TEXT NOT NULL,
            content_hash TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_records_hash ON records(content_hash);
        "#,
    )
    .map_err(db_error("Failed to create index tables"))?;

    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM index_meta WHERE key = 'dimension'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_error("Failed to read index metadata"))?;

    match stored {
        None => {
            conn.execute(
                "INSERT INTO index_meta (key, value) VALUES ('dimension', ?1)",
                params![dimension.to_string()],
            )
            .map_err(db_error("Failed to write index metadata"))?;
        }
        Some(value) => {
            let expected: usize = value.parse().map_err(|_| {
                AppError::Unavailable(format!("Corrupt index dimension: {}", value))
            })?;
            if expected != dimension {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
        }
    }

    Ok(())
}

/// Columns as stored, before decoding.
struct RawRecord {
    id: String,
    text: String,
    embedding: Vec<u8>,
    metadata: String,
    source_kind: String,
    created_at: String,
    content_hash: String,
}

const RECORD_COLUMNS: &str = "id, text, embedding, metadata, source_kind, created_at, content_hash";

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        embedding: row.get(2)?,
        metadata: row.get(3)?,
        source_kind: row.get(4)?,
        created_at: row.get(5)?,
        content_hash: row.get(6)?,
    })
}

impl RawRecord {
    fn decode(self) -> AppResult<Record> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Unavailable(format!("Corrupt timestamp for {}: {}", self.id, e)))?
            .with_timezone(&Utc);
        Ok(Record {
            vector: bytes_to_embedding(&self.embedding)?,
            metadata: serde_json::from_str(&self.metadata)?,
            source_kind: self.source_kind.parse::<SourceKind>()?,
            created_at,
            id: self.id,
            text: self.text,
            content_hash: self.content_hash,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingIndex for SqliteIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn store(&self, record: Record) -> AppResult<()> {
        self.check_dimension(record.vector.len())?;

        let embedding = embedding_to_bytes(&record.vector);
        let metadata = serde_json::to_string(&record.metadata)?;
        let created_at = record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let id = record.id.clone();

        with_connection(&self.conn, move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO records
                 (id, text, embedding, metadata, source_kind, created_at, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.text,
                    embedding,
                    metadata,
                    record.source_kind.as_str(),
                    created_at,
                    record.content_hash,
                ],
            )
            .map_err(db_error("Failed to store record"))?;
            Ok(())
        })
        .await?;

        tracing::debug!(id = %id, "Stored record");
        Ok(())
    }

    async fn search(&self, query: &[f32], top_k: usize) -> AppResult<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(AppError::InvalidArgument(
                "top_k must be greater than zero".to_string(),
            ));
        }
        self.check_dimension(query.len())?;

        let raws = with_connection(&self.conn, |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM records", RECORD_COLUMNS))
                .map_err(db_error("Failed to prepare search"))?;
            let rows = stmt
                .query_map([], read_raw)
                .map_err(db_error("Failed to query records"))?;
            let raws = rows
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error("Failed to read records"))?;
            Ok(raws)
        })
        .await?;

        let mut hits = raws
            .into_iter()
            .map(|raw| {
                let record = raw.decode()?;
                let score = cosine_similarity(query, &record.vector);
                Ok(SearchHit { record, score })
            })
            .collect::<AppResult<Vec<_>>>()?;

        hits.sort_by(rank_hits);
        hits.truncate(top_k);

        tracing::debug!("Retrieved {} records (requested top-{})", hits.len(), top_k);

        Ok(hits)
    }

    async fn get_by_id(&self, id: &str) -> AppResult<Record> {
        let key = id.to_string();
        let raw = with_connection(&self.conn, move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
                params![key],
                read_raw,
            )
            .optional()
            .map_err(db_error("Failed to read record"))
        })
        .await?;

        raw.ok_or_else(|| AppError::NotFound(format!("record '{}'", id)))?
            .decode()
    }

    async fn find_by_content_hash(&self, hash: &str) -> AppResult<Option<String>> {
        let hash = hash.to_string();
        with_connection(&self.conn, move |conn| {
            conn.query_row(
                "SELECT id FROM records WHERE content_hash = ?1
                 ORDER BY created_at DESC, id ASC LIMIT 1",
                params![hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error("Failed to look up content hash"))
        })
        .await
    }

    async fn count(&self) -> AppResult<usize> {
        with_connection(&self.conn, |conn| {
            conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(db_error("Failed to count records"))
        })
        .await
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let id = id.to_string();
        let removed = with_connection(&self.conn, move |conn| {
            conn.execute("DELETE FROM records WHERE id = ?1", params![id])
                .map(|n| n > 0)
                .map_err(db_error("Failed to delete record"))
        })
        .await?;
        tracing::debug!(removed, "Deleted record");
        Ok(removed)
    }

    async fn reset(&self) -> AppResult<()> {
        let removed = with_connection(&self.conn, |conn| {
            conn.execute("DELETE FROM records", [])
                .map_err(db_error("Failed to clear records"))
        })
        .await?;
        tracing::info!(removed, "Reset embedding index");
        Ok(())
    }
}

/// Score descending, then newest first, then id.
fn rank_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Unavailable(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, text: &str, vector: Vec<f32>) -> Record {
        Record::new(
            Some(id.to_string()),
            text,
            vector,
            serde_json::json!({"summary": text}),
            SourceKind::Text,
        )
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let index = SqliteIndex::open_in_memory(3).unwrap();
        index.store(record("r1", "test text", vec![1.0, 0.0, 0.0])).await.unwrap();

        let fetched = index.get_by_id("r1").await.unwrap();
        assert_eq!(fetched.text, "test text");
        assert_eq!(fetched.vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(fetched.metadata["summary"], "test text");
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let index = SqliteIndex::open_in_memory(3).unwrap();
        assert!(matches!(
            index.get_by_id("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_content_hash() {
        let index = SqliteIndex::open_in_memory(2).unwrap();
        let stored = record("a", "same words", vec![1.0, 0.0]);
        let hash = stored.content_hash.clone();
        index.store(stored).await.unwrap();

        assert_eq!(index.find_by_content_hash(&hash).await.unwrap(), Some("a".to_string()));
        assert_eq!(index.find_by_content_hash("feed").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/index.db");
        SqliteIndex::open(&path, 4).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(
            SqliteIndex::open_in_memory(0),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_embedding_bytes_round_trip() {
        let v = vec![0.5, -1.25, 3.0];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&v)).unwrap(), v);
        assert!(bytes_to_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![1.0, 0.0, 0.0];
        let d = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&c, &d) - 0.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}

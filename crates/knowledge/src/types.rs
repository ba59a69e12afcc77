//! Stored record types.

use chrono::{DateTime, Utc};
use insight_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Where the text of a record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Text,
    Audio,
    File,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "audio" => Ok(Self::Audio),
            "file" => Ok(Self::File),
            other => Err(AppError::InvalidArgument(format!(
                "unknown source kind '{}', expected text, audio or file",
                other
            ))),
        }
    }
}

/// A text with its embedding and analysis, owned by the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Unique record identifier
    pub id: String,

    pub text: String,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,

    /// Usually a serialized analysis result
    #[serde(default)]
    pub metadata: serde_json::Value,

    pub source_kind: SourceKind,

    pub created_at: DateTime<Utc>,

    /// SHA-256 of `text`, hex encoded
    pub content_hash: String,
}

impl Record {
    /// Create a record stamped now, with a generated id when none is given.
    pub fn new(
        id: Option<String>,
        text: impl Into<String>,
        vector: Vec<f32>,
        metadata: serde_json::Value,
        source_kind: SourceKind,
    ) -> Self {
        let text = text.into();
        let content_hash = content_hash(&text);
        Self {
            id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            text,
            vector,
            metadata,
            source_kind,
            created_at: Utc::now(),
            content_hash,
        }
    }
}

/// A record returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: Record,

    /// Cosine similarity to the query, higher is closer
    pub score: f32,
}

/// Hex SHA-256 of a text.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("Audio".parse::<SourceKind>().unwrap(), SourceKind::Audio);
        assert_eq!("file".parse::<SourceKind>().unwrap(), SourceKind::File);
        assert!(matches!(
            "video".parse::<SourceKind>(),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_record_generates_id_and_hash() {
        let a = Record::new(None, "hello", vec![1.0], serde_json::json!({}), SourceKind::Text);
        let b = Record::new(None, "hello", vec![1.0], serde_json::json!({}), SourceKind::Text);
        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

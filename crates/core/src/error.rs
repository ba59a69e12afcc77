//! Error types for the Insight engine.
//!
//! Every failure maps to a stable [`ErrorKind`] plus a human-readable
//! description. Component-local problems are absorbed by the components that
//! own them; everything that crosses a component boundary travels as an
//! `AppError`.

use serde::Serialize;
use thiserror::Error;

/// Unified error type for the Insight engine.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic: errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// A caller-supplied parameter violates a stated constraint
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Language model, embedding model or other remote service failed
    #[error("External service error ({service}): {message}")]
    ExternalService {
        service: String,
        message: String,
        retryable: bool,
    },

    /// A model replied with text that does not match the expected schema
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Vector length disagrees with the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The reasoning model could not be reached during a chat turn
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    /// Requirement extraction failed in the sales-assist pipeline
    #[error("Requirement extraction failed: {0}")]
    ExtractionFailed(String),

    /// Recommendation generation failed in the sales-assist pipeline
    #[error("Recommendation generation failed: {0}")]
    RecommendationFailed(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Stable, machine-readable classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    ExternalService,
    MalformedResponse,
    DimensionMismatch,
    NotFound,
    Unavailable,
    AgentUnavailable,
    ExtractionFailed,
    RecommendationFailed,
    Config,
    Io,
    Prompt,
    Serialization,
}

impl ErrorKind {
    /// Stable code used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::ExternalService => "external_service",
            Self::MalformedResponse => "malformed_response",
            Self::DimensionMismatch => "dimension_mismatch",
            Self::NotFound => "not_found",
            Self::Unavailable => "unavailable",
            Self::AgentUnavailable => "agent_unavailable",
            Self::ExtractionFailed => "extraction_failed",
            Self::RecommendationFailed => "recommendation_failed",
            Self::Config => "config",
            Self::Io => "io",
            Self::Prompt => "prompt",
            Self::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    /// Build an external-service failure.
    pub fn external(
        service: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        AppError::ExternalService {
            service: service.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::ExternalService { .. } => ErrorKind::ExternalService,
            AppError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            AppError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Unavailable(_) => ErrorKind::Unavailable,
            AppError::AgentUnavailable(_) => ErrorKind::AgentUnavailable,
            AppError::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            AppError::RecommendationFailed(_) => ErrorKind::RecommendationFailed,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io(_) => ErrorKind::Io,
            AppError::Prompt(_) => ErrorKind::Prompt,
            AppError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether a caller may retry the failed operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ExternalService {
                retryable: true,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_stable() {
        assert_eq!(
            AppError::InvalidArgument("x".into()).kind().as_str(),
            "invalid_argument"
        );
        assert_eq!(
            AppError::DimensionMismatch {
                expected: 3,
                actual: 4
            }
            .kind(),
            ErrorKind::DimensionMismatch
        );
        assert_eq!(ErrorKind::AgentUnavailable.to_string(), "agent_unavailable");
    }

    #[test]
    fn test_retryable_only_for_flagged_external_errors() {
        assert!(AppError::external("llm", "timeout", true).is_retryable());
        assert!(!AppError::external("llm", "unauthorized", false).is_retryable());
        assert!(!AppError::MalformedResponse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_description() {
        let err = AppError::DimensionMismatch {
            expected: 1536,
            actual: 384,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 1536, got 384");
    }
}

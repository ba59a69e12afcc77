//! LLM provider implementations.

pub mod ollama;
pub mod openai;
pub mod scripted;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedClient;

use crate::retry::message_looks_transient;
use insight_core::AppError;
use reqwest::StatusCode;

/// Map a transport-level reqwest failure to a classified external error.
pub fn request_error(service: &str, err: reqwest::Error) -> AppError {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    AppError::external(service, format!("request failed: {}", err), retryable)
}

/// Map a non-success HTTP status to a classified external error.
///
/// 408, 429 and 5xx are transient; other statuses are retried only when the
/// body carries a rate-limit or overload indicator.
pub fn status_error(service: &str, status: StatusCode, body: &str) -> AppError {
    let retryable = status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
        || message_looks_transient(body);
    AppError::external(service, format!("API error ({}): {}", status, body), retryable)
}

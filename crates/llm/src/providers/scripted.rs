//! Deterministic client that replays queued replies.
//!
//! Used by tests and offline demos to drive the engine through exact
//! model behaviour, including failures and malformed output.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use insight_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

type Responder = dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync;

/// Replays queued replies first, then falls back to an optional responder.
///
/// Once both are exhausted every call fails with a non-retryable
/// `ExternalService` error.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<AppResult<String>>>,
    responder: Option<Box<Responder>>,
    requests: Mutex<Vec<LlmRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Answer every call by inspecting the request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        let mut client = Self::new(Vec::<String>::new());
        client.responder = Some(Box::new(responder));
        client
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_replies().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: AppError) {
        self.lock_replies().push_back(Err(error));
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<AppResult<String>>> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_reply(&self, request: &LlmRequest) -> AppResult<String> {
        if let Some(reply) = self.lock_replies().pop_front() {
            return reply;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Err(AppError::external(
                "scripted",
                "no scripted reply left",
                false,
            )),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = self.next_reply(request)?;
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

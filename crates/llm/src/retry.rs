//! Exponential backoff for transient provider failures.
//!
//! Every outbound model or embedding call runs through [`retry_with_backoff`]:
//! a per-attempt timeout, then doubling delays capped by both a per-delay
//! ceiling and a total time budget. Only errors flagged retryable are
//! attempted again.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use insight_core::config::RetryConfig;
use insight_core::{AppError, AppResult};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE_LIMIT_INDICATORS: [&str; 7] = [
    "rate limit",
    "ratelimit",
    "too many requests",
    "429",
    "quota exceeded",
    "throttled",
    "requests per minute",
];

const TRANSIENT_INDICATORS: [&str; 8] = [
    "timeout",
    "timed out",
    "connection",
    "service unavailable",
    "503",
    "502",
    "internal server error",
    "temporar",
];

/// True when an error message reads like a rate-limit or transient outage.
pub fn message_looks_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_INDICATORS
        .iter()
        .chain(TRANSIENT_INDICATORS.iter())
        .any(|indicator| lower.contains(indicator))
}

/// Backoff schedule and budgets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Total budget; no new attempt starts once it is spent
    pub max_elapsed: Duration,
    /// Applied to each attempt individually
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_elapsed: Duration::from_secs(config.max_elapsed_secs),
            attempt_timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }
}

impl RetryPolicy {
    /// A single attempt with the given timeout.
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_elapsed: attempt_timeout,
            attempt_timeout,
        }
    }

    /// Delay before the attempt following `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy gives up.
///
/// `label` names the call in the backoff and give-up log lines.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::external(
                label,
                format!("timed out after {:?}", policy.attempt_timeout),
                true,
            )),
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        attempt += 1;
        if !error.is_retryable() {
            return Err(error);
        }

        let delay = policy.delay_for(attempt - 1);
        let out_of_attempts = attempt >= policy.max_attempts;
        let out_of_time = started.elapsed() + delay >= policy.max_elapsed;
        if out_of_attempts || out_of_time {
            tracing::error!(
                call = label,
                tries = attempt,
                error = %error,
                "Gave up after retries"
            );
            return Err(error);
        }

        tracing::warn!(
            call = label,
            tries = attempt,
            wait_ms = delay.as_millis() as u64,
            error = %error,
            "Backing off before retry"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Wraps any client with the retry and timeout policy.
pub struct ResilientClient {
    inner: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(inner: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait::async_trait]
impl LlmClient for ResilientClient {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let label = format!("{}.complete", self.inner.provider_name());
        retry_with_backoff(&self.policy, &label, || self.inner.complete(request)).await
    }
}

//! Retry with exponential backoff, `Retry-After` support, and credential refresh.
//!
//! A retriable outcome is either a transient transport failure or a response whose status
//! is in the retriable set (408, 429, and 5xx except 501 and 505). Each retry drains the
//! failed response's body, sleeps, and re-enters the pipeline from its head with the
//! original call's context, so earlier policies (signing, request id) run again. The
//! attempt counter lives in the context: re-entry passes back through this policy without
//! resetting it.

use async_trait::async_trait;
use http::StatusCode;
use rand::Rng;
use std::time::{Duration, SystemTime};

use crate::context::PolicyContext;
use crate::error::{Error, Result};
use crate::headers::HttpHeaders;
use crate::pipeline::{Next, NonReplayableBody, Policy};
use crate::response::HttpResponse;

use super::credentials::CredentialHandle;

const DEFAULT_MAX_RETRIES: usize = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Upper bound honored for a server-supplied `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Message prefixes a service uses to report an expired or invalid access token.
const TOKEN_EXPIRED_PREFIXES: [&str; 2] =
    ["The access token expiry", "The access token is missing or invalid"];

/// Per-call retry bookkeeping, kept in the context so pipeline re-entry sees it.
#[derive(Debug, Clone, Copy, Default)]
struct RetryState {
    attempts: usize,
    refreshed: bool,
}

/// Retries transient failures with exponentially backed-off delays.
///
/// # Examples
///
/// ```
/// use declarest::policies::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_retries(5)
///     .with_base_delay(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates the policy with defaults: 3 retries, 10 ms base delay, jitter on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries (not counting the initial attempt or
    /// credential-refresh re-entries).
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry; later retries double it.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Caps the backoff delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Disables jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// The delay before retry attempt `attempt` (1-indexed).
    ///
    /// The deterministic envelope doubles from the base delay and is capped; jitter adds a
    /// uniform amount in `[0, envelope)` on top, so a jittered delay never undercuts the
    /// deterministic one.
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as u32;
        let envelope = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        if self.jitter && envelope > Duration::ZERO {
            let extra = rand::thread_rng().gen_range(0..envelope.as_nanos().max(1)) as u64;
            envelope + Duration::from_nanos(extra)
        } else {
            envelope
        }
    }
}

/// Statuses worth another attempt: request timeout, throttling, and server errors that
/// are not "not implemented" or "HTTP version not supported".
fn is_retriable_status(status: StatusCode) -> bool {
    match status.as_u16() {
        408 | 429 => true,
        501 | 505 => false,
        code => (500..=599).contains(&code),
    }
}

/// Parses `Retry-After` as delay-seconds or an HTTP-date, capped at [`MAX_RETRY_AFTER`].
fn retry_after(headers: &HttpHeaders) -> Option<Duration> {
    let value = headers.get("retry-after")?;

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }

    if let Ok(at) = httpdate::parse_http_date(value) {
        if let Ok(until) = at.duration_since(SystemTime::now()) {
            return Some(until.min(MAX_RETRY_AFTER));
        }
    }

    None
}

/// Checks a 401 response for the token-expiry signature: error code
/// `AuthenticationFailed` with a message starting with one of the known prefixes.
///
/// The body is buffered so it stays readable by whoever ultimately surfaces the 401.
/// Accepts the code/message pair both at the body's top level and nested under `error`.
async fn is_token_expired(response: &mut HttpResponse) -> bool {
    if response.buffer().await.is_err() {
        return false;
    }
    let Ok(text) = response.body_text().await else { return false };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else { return false };
    let body = value.get("error").unwrap_or(&value);

    let code_matches = body
        .get("code")
        .and_then(|c| c.as_str())
        .map(|c| c == "AuthenticationFailed")
        .unwrap_or(false);
    let message_matches = body
        .get("message")
        .and_then(|m| m.as_str())
        .map(|m| TOKEN_EXPIRED_PREFIXES.iter().any(|p| m.starts_with(p)))
        .unwrap_or(false);

    code_matches && message_matches
}

#[async_trait]
impl Policy for RetryPolicy {
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
        let head = next.restart();
        let outcome = next.run(ctx).await;

        if ctx.extensions().get::<RetryState>().is_none() {
            ctx.extensions_mut().insert(RetryState::default());
        }
        let state = ctx.extensions().get::<RetryState>().copied().unwrap_or_default();
        let replayable = ctx.extensions().get::<NonReplayableBody>().is_none();

        match outcome {
            Ok(mut response) => {
                let status = response.status();

                if status == StatusCode::UNAUTHORIZED && !state.refreshed && replayable {
                    if let Some(handle) = ctx.extensions().get::<CredentialHandle>().cloned() {
                        if is_token_expired(&mut response).await {
                            handle.0.refresh().await?;
                            if let Some(s) = ctx.extensions_mut().get_mut::<RetryState>() {
                                s.refreshed = true;
                            }
                            tracing::info!(
                                url = %ctx.request().url(),
                                "Access token expired; credential refreshed, retrying"
                            );
                            drop(response);
                            return head.run(ctx).await;
                        }
                    }
                }

                if !is_retriable_status(status) || state.attempts >= self.max_retries || !replayable
                {
                    return Ok(response);
                }

                let delay = retry_after(response.headers())
                    .unwrap_or_else(|| self.delay_for_attempt(state.attempts + 1));
                response.body_mut().drain().await;
                drop(response);

                if let Some(s) = ctx.extensions_mut().get_mut::<RetryState>() {
                    s.attempts += 1;
                }
                tracing::info!(
                    status = status.as_u16(),
                    attempt = state.attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request after delay"
                );
                tokio::time::sleep(delay).await;
                head.run(ctx).await
            }
            Err(Error::Transport(ref transport_error))
                if transport_error.is_retryable()
                    && state.attempts < self.max_retries
                    && replayable =>
            {
                let delay = self.delay_for_attempt(state.attempts + 1);
                if let Some(s) = ctx.extensions_mut().get_mut::<RetryState>() {
                    s.attempts += 1;
                }
                tracing::warn!(
                    error = %transport_error,
                    attempt = state.attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Transport failure; retrying after delay"
                );
                tokio::time::sleep(delay).await;
                head.run(ctx).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyHandle;
    use bytes::Bytes;

    #[test]
    fn retriable_status_set() {
        assert!(is_retriable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retriable_status(StatusCode::NOT_IMPLEMENTED));
        assert!(!is_retriable_status(StatusCode::HTTP_VERSION_NOT_SUPPORTED));
        assert!(!is_retriable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retriable_status(StatusCode::OK));
    }

    #[test]
    fn deterministic_delays_double_and_cap() {
        let policy = RetryPolicy::new()
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(25))
            .without_jitter();

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(25));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(25));
    }

    #[test]
    fn jittered_delay_never_undercuts_the_envelope() {
        let policy = RetryPolicy::new().with_base_delay(Duration::from_millis(10));
        for attempt in 1..=4 {
            let deterministic = policy.clone().without_jitter().delay_for_attempt(attempt);
            for _ in 0..50 {
                let jittered = policy.delay_for_attempt(attempt);
                assert!(jittered >= deterministic);
                assert!(jittered < deterministic * 2);
            }
        }
    }

    #[test]
    fn retry_after_seconds_and_cap() {
        let mut headers = HttpHeaders::new();
        headers.set("Retry-After", "2");
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));

        headers.set("Retry-After", "9000");
        assert_eq!(retry_after(&headers), Some(MAX_RETRY_AFTER));

        headers.set("Retry-After", "not-a-delay");
        assert_eq!(retry_after(&headers), None);
    }

    #[tokio::test]
    async fn token_expiry_detection() {
        let expired = r#"{"error":{"code":"AuthenticationFailed","message":"The access token expiry is in the past"}}"#;
        let mut response = HttpResponse::new(
            StatusCode::UNAUTHORIZED,
            HttpHeaders::new(),
            BodyHandle::from_bytes(Bytes::from_static(expired.as_bytes())),
        );
        assert!(is_token_expired(&mut response).await);
        // the body stays readable for whoever surfaces the 401
        assert!(response.body_mut().bytes().await.is_ok());

        let flat = r#"{"code":"AuthenticationFailed","message":"The access token is missing or invalid"}"#;
        let mut response = HttpResponse::new(
            StatusCode::UNAUTHORIZED,
            HttpHeaders::new(),
            BodyHandle::from_bytes(Bytes::from_static(flat.as_bytes())),
        );
        assert!(is_token_expired(&mut response).await);

        let other = r#"{"error":{"code":"AuthenticationFailed","message":"Signature mismatch"}}"#;
        let mut response = HttpResponse::new(
            StatusCode::UNAUTHORIZED,
            HttpHeaders::new(),
            BodyHandle::from_bytes(Bytes::from_static(other.as_bytes())),
        );
        assert!(!is_token_expired(&mut response).await);
    }
}

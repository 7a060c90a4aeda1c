use std::time::Duration;

use anyhow::{bail, Context, Result};

const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Retry budget shared by every GitHub request issued within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GithubRetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl GithubRetryPolicy {
    pub fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base_delay_ms.max(1),
        }
    }

    pub fn allows_another_attempt(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    pub fn delay_for(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        retry_delay(self.base_delay_ms, attempt, retry_after)
    }
}

impl Default for GithubRetryPolicy {
    fn default() -> Self {
        Self::new(3, 500)
    }
}

pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let raw = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = raw.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay
            .max(Duration::from_millis(base_delay_ms))
            .min(Duration::from_millis(MAX_RETRY_DELAY_MS));
    }
    let exponent = attempt.saturating_sub(1).min(10) as u32;
    let scaled = base_delay_ms.saturating_mul(2_u64.saturating_pow(exponent));
    Duration::from_millis(scaled.min(MAX_RETRY_DELAY_MS))
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// 429 and 5xx are retried; a 403 is retried only when GitHub reports the rate limit
/// as exhausted (secondary limits surface that way).
pub fn is_retryable_github_response(status: u16, headers: &reqwest::header::HeaderMap) -> bool {
    if status == 429 || status >= 500 {
        return true;
    }
    status == 403
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim() == "0")
            .unwrap_or(false)
}

pub fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Sends a request built by `request_builder`, retrying rate limits, server errors and
/// transient transport failures within `retry`.
///
/// Responses whose status is in `accepted_statuses` are handed back like successes so the
/// caller can interpret them.
pub async fn send_github_request<F>(
    retry: &GithubRetryPolicy,
    operation: &str,
    accepted_statuses: &[u16],
    mut request_builder: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut attempt = 0_usize;
    loop {
        attempt = attempt.saturating_add(1);
        tracing::debug!(operation, attempt, "sending github request");
        match request_builder().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || accepted_statuses.contains(&status.as_u16()) {
                    return Ok(response);
                }
                let retryable = is_retryable_github_response(status.as_u16(), response.headers());
                let retry_after = parse_retry_after(response.headers());
                let body = response.text().await.unwrap_or_default();
                if retryable && retry.allows_another_attempt(attempt) {
                    let delay = retry.delay_for(attempt, retry_after);
                    tracing::warn!(
                        operation,
                        status = status.as_u16(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying github request"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                bail!(
                    "github api {operation} failed with status {}: {}",
                    status.as_u16(),
                    truncate_for_error(&body, 800)
                );
            }
            Err(error) => {
                if retry.allows_another_attempt(attempt) && is_retryable_transport_error(&error) {
                    tokio::time::sleep(retry.delay_for(attempt, None)).await;
                    continue;
                }
                return Err(error).with_context(|| format!("github api {operation} request failed"));
            }
        }
    }
}

pub async fn send_with_retry<F>(
    retry: &GithubRetryPolicy,
    operation: &str,
    request_builder: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    send_github_request(retry, operation, &[], request_builder).await
}

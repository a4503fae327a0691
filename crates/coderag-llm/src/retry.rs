use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Bounded exponential backoff for transient provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt + 1`. A server-provided hint wins over the
    /// computed backoff; both are capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_delay);
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Parse the `Retry-After` header value as seconds.
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    let val = response.headers().get("retry-after")?;
    let secs = val.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

/// Turn a non-success response into the matching [`LlmError`].
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let hint = retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::from_status(status, &body, hint))
}

/// Run `f` until it succeeds, fails permanently, or `policy.max_retries` retries are spent.
///
/// # Errors
///
/// Returns the last error produced by `f`.
pub async fn with_retry<T, F, Fut>(
    provider_name: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let hint = match &e {
                    LlmError::RateLimited { retry_after } => *retry_after,
                    _ => None,
                };
                let delay = policy.delay_for(attempt, hint);
                tracing::warn!(
                    provider = provider_name,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

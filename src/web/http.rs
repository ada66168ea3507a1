use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ToolError, ToolResult};

const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

/// Attempts include the first try; delays double from `base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_secs(1),
        }
    }
}

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

fn retry_base_delay(base: Duration, attempt: usize) -> Duration {
    let multiplier = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier)
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

fn status_error(status: StatusCode, attempts: usize) -> ToolError {
    match status {
        StatusCode::NOT_FOUND => ToolError::NotFound(format!("Host returned {}", status)),
        s if is_retriable_status(s) || s.is_server_error() => ToolError::Transient(format!(
            "Host returned {} after {} attempt(s)",
            status, attempts
        )),
        s => ToolError::BadRequest(format!("Host rejected the request: {}", s)),
    }
}

fn cancelled() -> ToolError {
    ToolError::Timeout("Request cancelled".to_string())
}

/// Send with bounded exponential backoff. Every wait, including the
/// request itself, returns early once `cancel` fires.
pub(super) async fn send_with_retry(
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> ToolResult<reqwest::Response> {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 0..max_attempts {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            sent = make_request().send() => sent,
        };
        let last = attempt + 1 >= max_attempts;

        match sent {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                if !is_retriable_status(status) || last {
                    return Err(status_error(status, attempt + 1));
                }

                let base_delay = retry_base_delay(policy.base_delay, attempt);
                let delay = add_jitter(base_delay);
                debug!(
                    "HTTP request failed with status {}; retrying in {:?} (base {:?}, attempt {}/{})",
                    status,
                    delay,
                    base_delay,
                    attempt + 1,
                    max_attempts
                );
                let _ = response.bytes().await;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = sleep(delay) => {}
                }
            }
            Err(err) => {
                if !is_retriable_send_error(&err) || last {
                    return Err(ToolError::Transient(format!(
                        "HTTP request failed after {} attempt(s): {}",
                        attempt + 1,
                        err
                    )));
                }

                let base_delay = retry_base_delay(policy.base_delay, attempt);
                let delay = add_jitter(base_delay);
                debug!(
                    "HTTP request error: {}; retrying in {:?} (base {:?}, attempt {}/{})",
                    err,
                    delay,
                    base_delay,
                    attempt + 1,
                    max_attempts
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = sleep(delay) => {}
                }
            }
        }
    }

    Err(ToolError::Transient("HTTP request was never attempted".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(retry_base_delay(base, 0), Duration::from_millis(100));
        assert_eq!(retry_base_delay(base, 2), Duration::from_millis(400));
        let jittered = add_jitter(Duration::from_millis(400));
        assert!(jittered >= Duration::from_millis(400) && jittered <= Duration::from_millis(500));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, 3).kind(),
            crate::error::ErrorKind::Transient
        );
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, 1).kind(),
            crate::error::ErrorKind::NotFound
        );
        assert_eq!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, 1).kind(),
            crate::error::ErrorKind::BadRequest
        );
    }
}

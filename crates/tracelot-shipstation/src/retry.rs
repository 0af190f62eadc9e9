//! Bounded retry with throttle-derived delays for the `ShipStation` client.
//!
//! [`retry_with_throttle`] wraps any fallible async operation and retries on
//! transient errors (network failures, HTTP 429/5xx). The delay schedule is
//! derived from the run's inter-page throttle rather than an exponential
//! curve: rate-limit responses wait `min(throttle, 60)` seconds and other
//! transient errors wait `min(throttle * attempt, 120)` seconds.

use std::future::Future;
use std::time::Duration;

use crate::error::ShipstationError;

/// Longest sleep allowed after a 429 response.
const MAX_RATE_LIMIT_DELAY_SECS: u64 = 60;

/// Longest sleep allowed after any other transient error.
const MAX_TRANSIENT_DELAY_SECS: u64 = 120;

/// Returns `true` for errors worth retrying after a delay.
///
/// **Retriable:**
/// - [`ShipstationError::RateLimited`] — HTTP 429; the server asked us to back off.
/// - [`ShipstationError::Http`] for timeouts, connection failures, and 5xx.
///
/// **Not retriable:**
/// - [`ShipstationError::Http`] for 4xx statuses — retrying returns the same answer.
/// - [`ShipstationError::Deserialize`] — malformed response; retrying won't fix it.
pub(crate) fn is_retriable(err: &ShipstationError) -> bool {
    match err {
        ShipstationError::RateLimited { .. } => true,
        ShipstationError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ShipstationError::InvalidBaseUrl(_) | ShipstationError::Deserialize { .. } => false,
    }
}

/// Runs `operation` up to `max_attempts` times, sleeping between attempts on
/// transient errors.
///
/// With `throttle_secs = 2` and `max_attempts = 5`, a persistently failing
/// call attempts at times 0s, +2s, +4s, +6s, +8s before giving up; a
/// persistently rate-limited call waits a flat 2s between attempts. After
/// the final attempt the last error is returned. Non-retriable errors are
/// returned immediately.
pub(crate) async fn retry_with_throttle<T, F, Fut>(
    max_attempts: u32,
    throttle_secs: u64,
    mut operation: F,
) -> Result<T, ShipstationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ShipstationError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_attempts.max(1) {
                    return Err(err);
                }
                let delay_secs = match &err {
                    ShipstationError::RateLimited { .. } => {
                        throttle_secs.min(MAX_RATE_LIMIT_DELAY_SECS)
                    }
                    _ => throttle_secs
                        .saturating_mul(u64::from(attempt))
                        .min(MAX_TRANSIENT_DELAY_SECS),
                };
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_secs,
                    error = %err,
                    "transient ShipStation error — retrying after throttle"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ShipstationError {
        ShipstationError::RateLimited {
            retry_after_secs: Some(1),
        }
    }

    fn deserialize_err() -> ShipstationError {
        let src = serde_json::from_str::<()>("invalid").unwrap_err();
        ShipstationError::Deserialize {
            context: "test".to_owned(),
            source: src,
        }
    }

    #[test]
    fn rate_limited_is_retriable() {
        assert!(is_retriable(&rate_limited()));
    }

    #[test]
    fn deserialize_error_is_not_retriable() {
        assert!(!is_retriable(&deserialize_err()));
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_throttle(5, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ShipstationError>(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_throttle(5, 0, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, ShipstationError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_throttle(5, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ShipstationError>(rate_limited())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 5, "5 attempts total");
        assert!(matches!(result, Err(ShipstationError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_deserialize_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_throttle(5, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ShipstationError>(deserialize_err())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ShipstationError::Deserialize { .. })));
    }
}

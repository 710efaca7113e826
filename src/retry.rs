// src/retry.rs
use std::future::Future;
use std::time::Duration;

use metrics::counter;

use crate::error::FetchError;
use crate::timeline::budget::RATE_WINDOW;

/// Bounded retry for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed wait when the server gives no hint.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn no_wait(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Duration::ZERO,
        }
    }

    fn delay_for(&self, err: &FetchError) -> Duration {
        match err {
            FetchError::Transient {
                retry_after: Some(hint),
                ..
            } => (*hint).min(RATE_WINDOW),
            _ => self.backoff,
        }
    }
}

/// Run `op`, retrying transient failures up to `policy.max_retries` times.
/// Fatal failures and the last transient failure are returned as-is.
pub async fn retry_transient<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(&e);
                tracing::warn!(
                    target: "retry",
                    label,
                    attempt,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                counter!("poll_fetch_retries_total").increment(1);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_then_success_is_retried() {
        let calls = AtomicU32::new(0);
        let out = retry_transient(RetryPolicy::no_wait(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FetchError::transient("503"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(out, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = retry_transient(RetryPolicy::no_wait(2), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::transient("429")) }
        })
        .await;
        assert!(matches!(out, Err(FetchError::Transient { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = retry_transient(RetryPolicy::no_wait(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::fatal(Some(401), "unauthorized")) }
        })
        .await;
        assert!(matches!(out, Err(FetchError::Fatal { status: Some(401), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_hint_overrides_backoff() {
        let policy = RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_secs(10),
        };
        let calls = AtomicU32::new(0);
        let t0 = tokio::time::Instant::now();
        let _ = retry_transient(policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FetchError::Transient {
                        reason: "429".into(),
                        retry_after: Some(Duration::from_secs(30)),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(t0.elapsed() >= Duration::from_secs(30));
    }
}

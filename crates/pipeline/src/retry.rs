//! Retry with exponential backoff
//!
//! Transient provider faults are retried with exponential backoff and
//! jitter: base 200 ms, factor 2, at most 3 attempts, jitter of 20 percent.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
    /// Jitter fraction applied to each delay, e.g. 0.2 for 20 percent
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            factor: 2,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based), jittered
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64 * self.factor.pow(attempt - 1) as f64;
        let jitter = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::from_millis((base * (1.0 + jitter)).max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, a non-transient error occurs, or the
/// attempt budget is exhausted. `is_transient` decides retryability.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_transient: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts && is_transient(&error) => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry_with_backoff(
            &RetryPolicy::default(),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(PipelineError::SttUnavailable("flaky".to_string()))
                    } else {
                        Ok("ok")
                    }
                }
            },
            PipelineError::is_transient,
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::default(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(PipelineError::TtsTransientFailure("down".to_string()))
                }
            },
            PipelineError::is_transient,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), _> = retry_with_backoff(
            &RetryPolicy::default(),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(PipelineError::LlmTimeout(5000))
                }
            },
            PipelineError::is_transient,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_growth() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }
}

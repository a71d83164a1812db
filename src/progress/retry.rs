// Bounded local retry for transient store failures
//
// Completion is idempotent, so replaying it after a failed commit can never
// advance a user twice.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::ProgressError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A policy that gives up after the first failure
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let capped = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);

        if self.jitter && capped > 0 {
            Duration::from_millis(rand::rng().random_range(0..=capped))
        } else {
            Duration::from_millis(capped)
        }
    }

    /// Run `op`, retrying retryable failures with exponential backoff
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ProgressError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProgressError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn busy() -> ProgressError {
        ProgressError::from(StoreError::Busy("database is locked".to_string()))
    }

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_success_after_failure() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result = fast()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(busy())
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), _> = fast()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(busy())
                }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), _> = fast()
            .run("test", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProgressError::NotFound {
                        entity: "module",
                        id: "missing".to_string(),
                    })
                }
            })
            .await;

        assert!(result.unwrap_err().is_not_found());
        // Should fail immediately without retries
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: false,
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(8), Duration::from_millis(1_000));

        let jittered = RetryConfig { jitter: true, ..config };
        assert!(jittered.delay_for(3) <= Duration::from_millis(400));
    }
}

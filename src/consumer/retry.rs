//! Backoff for statistics publishing and transport restarts
//!
//! Two policies are in play. Publishing a statistics record is retried a few
//! times and then given up, so one stuck record cannot stall the stream.
//! Reconnecting a failed transport is retried for as long as the process runs.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Longest delay a policy may configure
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Doubling backoff with jitter and an optional retry limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; absent means retry forever
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the doubled delay
    pub max_backoff: Duration,
    /// Extra random delay as a share of the backoff (0.0 to 1.0)
    pub jitter: f64,
}

impl RetryPolicy {
    /// Publishing policy: three retries from 100ms, capped at 5s
    pub fn publish() -> Self {
        Self {
            max_retries: Some(3),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            jitter: 0.1,
        }
    }

    /// Restart policy: never gives up, backing off from 1s to 60s
    pub fn restart() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            jitter: 0.1,
        }
    }

    /// Whether retry number `retry` (counting from 1) is still allowed
    pub fn should_retry(&self, retry: u32) -> bool {
        self.max_retries.map_or(true, |max| retry <= max)
    }

    /// Delay before retry number `retry` (counting from 1)
    pub fn backoff(&self, retry: u32) -> Duration {
        let doublings = retry.saturating_sub(1).min(31);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << doublings)
            .min(self.max_backoff);
        if self.jitter > 0.0 {
            base.mul_f64(1.0 + self.jitter * rand::random::<f64>())
        } else {
            base
        }
    }

    /// Check the bounds
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_backoff > self.max_backoff {
            return Err(format!(
                "initial_backoff {:?} exceeds max_backoff {:?}",
                self.initial_backoff, self.max_backoff
            ));
        }
        if self.max_backoff > MAX_BACKOFF {
            return Err(format!("max_backoff {:?} exceeds {:?}", self.max_backoff, MAX_BACKOFF));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!("jitter {} must be between 0.0 and 1.0", self.jitter));
        }
        Ok(())
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or
    /// the retries run out. The last error is returned.
    pub async fn retry<T, E, F, Fut, R>(&self, mut op: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut retry = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    retry = retry.saturating_add(1);
                    if !retryable(&e) || !self.should_retry(retry) {
                        return Err(e);
                    }
                    let delay = self.backoff(retry);
                    debug!(retry, ?delay, "Retrying after error: {}", e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::publish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn immediate(max_retries: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_restart_never_gives_up() {
        let policy = RetryPolicy::restart();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(1_000));
        assert!(policy.should_retry(u32::MAX));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_publish_is_bounded() {
        let policy = RetryPolicy::publish();
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::restart()
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(6), Duration::from_secs(32));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::restart();
        for retry in 1..20 {
            let delay = policy.backoff(retry);
            let base = Duration::from_secs(1 << (retry - 1).min(6)).min(Duration::from_secs(60));
            assert!(delay >= base && delay <= base.mul_f64(1.1), "{:?}", delay);
        }
    }

    #[test]
    fn test_validate() {
        let inverted = RetryPolicy {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(1),
            ..RetryPolicy::publish()
        };
        assert!(inverted.validate().is_err());

        let wild = RetryPolicy {
            jitter: 2.0,
            ..RetryPolicy::publish()
        };
        assert!(wild.validate().is_err());
    }

    #[test]
    fn test_yaml_without_limit_is_unbounded() {
        let policy: RetryPolicy = serde_yaml::from_str(
            "initial_backoff: {secs: 1, nanos: 0}\nmax_backoff: {secs: 60, nanos: 0}\njitter: 0.1",
        )
        .unwrap();
        assert_eq!(policy, RetryPolicy::restart());
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = immediate(Some(3))
            .retry(
                move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("busy".to_string())
                    } else {
                        Ok(n)
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_limit() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = immediate(Some(2))
            .retry(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("down".to_string())
                },
                |_| true,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_at_once() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = immediate(None)
            .retry(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("encode".to_string())
                },
                |e| e != "encode",
            )
            .await;
        assert_eq!(result, Err("encode".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::discovery::DiscoveryError;

/// 재시도 정책
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// 최대 시도 횟수
    pub max_attempts: u32,
    /// 재시도 간격
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(2),
        }
    }
}

/// 재시도 가능한 작업 특성
#[async_trait]
pub trait RetryableOperation: Send + Sync {
    type Output: Send;

    async fn execute(&self) -> Result<Self::Output, DiscoveryError>;

    fn should_retry(&self, error: &DiscoveryError) -> bool {
        error.is_retryable()
    }
}

/// 재시도 로직 실행
pub async fn with_retry<T: RetryableOperation>(
    operation: T,
    policy: RetryPolicy,
) -> Result<T::Output, DiscoveryError> {
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation.execute().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempts >= policy.max_attempts || !operation.should_retry(&error) {
                    return Err(error);
                }

                warn!(
                    error = %error,
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    "작업 실패, 재시도 예정"
                );

                sleep(policy.interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        attempts: AtomicU32,
        fail_times: u32,
        retryable: bool,
    }

    #[async_trait]
    impl RetryableOperation for Flaky {
        type Output = u32;

        async fn execute(&self) -> Result<u32, DiscoveryError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_times {
                Err(DiscoveryError::Other("일시적 실패".to_string()))
            } else {
                Ok(attempt)
            }
        }

        fn should_retry(&self, _error: &DiscoveryError) -> bool {
            self.retryable
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn succeeds_after_failures() {
        let op = Flaky { attempts: AtomicU32::new(0), fail_times: 2, retryable: true };
        assert_eq!(with_retry(op, policy()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let op = Flaky { attempts: AtomicU32::new(0), fail_times: 5, retryable: true };
        assert!(with_retry(op, policy()).await.is_err());
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let op = Flaky { attempts: AtomicU32::new(0), fail_times: 1, retryable: false };
        assert!(with_retry(op, policy()).await.is_err());
    }
}

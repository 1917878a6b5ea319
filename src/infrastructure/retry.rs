//! 重试策略 - 基础设施层
//!
//! 包装一个返回 `Result<T, E>` 的异步操作：
//! - 最多调用 `max_attempts` 次（包括第一次）
//! - 两次调用之间按固定间隔或指数退避等待
//! - `retryable` 判断某个错误是否值得重试，不可重试的错误立即返回

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 退避方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 每次等待相同时间
    Fixed(Duration),
    /// 第 n 次失败后等待 `base * 2^(n-1)`
    Exponential { base: Duration },
}

impl Backoff {
    /// 第 `failed_attempts` 次失败（从1开始）之后的等待时间
    pub fn delay_after(&self, failed_attempts: usize) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base } => {
                let exp = failed_attempts.saturating_sub(1).min(16) as u32;
                base.saturating_mul(2u32.saturating_pow(exp))
            }
        }
    }
}

type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// 重试策略
pub struct RetryPolicy<E> {
    name: String,
    max_attempts: usize,
    backoff: Backoff,
    retryable: Option<RetryPredicate<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            retryable: self.retryable.clone(),
        }
    }
}

impl<E: Display> RetryPolicy<E> {
    /// 创建重试策略，`max_attempts` 至少为 1
    pub fn new(name: impl Into<String>, max_attempts: usize, backoff: Backoff) -> Self {
        Self {
            name: name.into(),
            max_attempts: max_attempts.max(1),
            backoff,
            retryable: None,
        }
    }

    /// 固定间隔
    pub fn fixed(name: impl Into<String>, max_attempts: usize, delay: Duration) -> Self {
        Self::new(name, max_attempts, Backoff::Fixed(delay))
    }

    /// 指数退避
    pub fn exponential(name: impl Into<String>, max_attempts: usize, base: Duration) -> Self {
        Self::new(name, max_attempts, Backoff::Exponential { base })
    }

    /// 只重试满足条件的错误（默认全部重试）
    pub fn retry_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.retryable = Some(Arc::new(predicate));
        self
    }

    fn is_retryable(&self, err: &E) -> bool {
        self.retryable.as_ref().map_or(true, |p| p(err))
    }

    /// 执行操作，必要时重试
    ///
    /// # 参数
    /// - `label`: 日志中标识本次操作的对象（如图片路径）
    /// - `op`: 每次调用都会重新创建 future
    ///
    /// # 返回
    /// 第一次成功的结果，或最后一次的错误
    pub async fn run<T, F, Fut>(&self, label: impl Display, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !self.is_retryable(&err) {
                warn!("{} {} 出现不可重试的错误: {}", label, self.name, err);
                return Err(err);
            }

            if attempt >= self.max_attempts {
                warn!(
                    "{} {} 已尝试 {} 次仍失败: {}",
                    label, self.name, self.max_attempts, err
                );
                return Err(err);
            }

            let delay = self.backoff.delay_after(attempt);
            debug!(
                "{} {} 第 {}/{} 次失败 ({})，{:?} 后重试",
                label, self.name, attempt, self.max_attempts, err, delay
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    enum Failure {
        Pending,
        Malformed,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn polling_policy() -> RetryPolicy<Failure> {
        RetryPolicy::exponential("OCR 轮询", 5, Duration::from_secs(2))
            .retry_if(|e| *e == Failure::Pending)
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_invoked_once() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = polling_policy()
            .run("img", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::Malformed) }
            })
            .await;

        assert_eq!(result, Err(Failure::Malformed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_is_invoked_max_attempts_times() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = polling_policy()
            .run("img", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::Pending) }
            })
            .await;

        assert_eq!(result, Err(Failure::Pending));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // 2 + 4 + 8 + 16
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = RetryPolicy::<Failure>::fixed("上传", 4, Duration::from_secs(3))
            .run("img", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Failure::Malformed)
                    } else {
                        Ok("image-id")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("image-id"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(2),
        };
        let delays: Vec<_> = (1..=4).map(|n| backoff.delay_after(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16]);
        assert_eq!(
            Backoff::Fixed(Duration::from_secs(3)).delay_after(7),
            Duration::from_secs(3)
        );
    }
}

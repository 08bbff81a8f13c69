//! 启动阶段的连接重试
//!
//! 只重试基础设施类错误，配置错误立即返回。

use std::future::Future;
use std::time::Duration;

use dcache_errors::AppResult;
use tracing::{info, warn};

/// 重试策略（指数退避，封顶）
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// 第 `attempt` 次失败后的等待时间（从 0 开始）
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(16));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// 执行 `operation`，可重试错误按策略退避后再试
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation_name: &str, mut operation: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(operation = operation_name, attempt = attempt + 1, error = %e, "Operation failed");
                return Err(e);
            }
        }
    }
}

//! Redis 分布式锁实现

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use dcache_config::LockConfig;
use dcache_errors::{AppError, AppResult};
use dcache_ports::{DistributedLock, LockHandle};
use redis::Script;
use redis::aio::ConnectionManager;
use tokio::time::{Instant, sleep};
use tracing::debug;
use uuid::Uuid;

/// 只有 token 匹配时才删除锁
pub const RELEASE_LOCK_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

/// 轮询间隔的最大放大倍数
const MAX_BACKOFF_FACTOR: u32 = 8;

/// Redis 分布式锁
///
/// 锁带租期，持有者崩溃后最迟在租期结束时自动释放；不做自动续期。
pub struct RedisDistributedLock {
    conn: ConnectionManager,
    lease: Duration,
    wait_timeout: Option<Duration>,
    poll_interval: Duration,
    release_script: OnceLock<Script>,
}

impl RedisDistributedLock {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::from_config(conn, &LockConfig::default())
    }

    pub fn from_config(conn: ConnectionManager, config: &LockConfig) -> Self {
        Self {
            conn,
            lease: config.lease(),
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
            release_script: OnceLock::new(),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// `None` 表示无限等待
    pub fn with_wait_timeout(mut self, wait_timeout: Option<Duration>) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn release_script(&self) -> &Script {
        self.release_script
            .get_or_init(|| Script::new(RELEASE_LOCK_SCRIPT))
    }

    async fn acquire(&self, name: &str, token: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(name)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.lease.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis lock acquire failed: {}", e)))?;

        Ok(result.is_some())
    }
}

/// 第 `attempt` 次重试前的等待时间，按倍数增长并封顶
fn backoff(poll_interval: Duration, attempt: u32) -> Duration {
    let factor = 1_u32
        .checked_shl(attempt)
        .unwrap_or(MAX_BACKOFF_FACTOR)
        .min(MAX_BACKOFF_FACTOR);
    poll_interval * factor
}

#[async_trait]
impl DistributedLock for RedisDistributedLock {
    async fn lock(&self, name: &str) -> AppResult<LockHandle> {
        let token = Uuid::new_v4().to_string();
        let deadline = self.wait_timeout.map(|timeout| Instant::now() + timeout);
        let mut attempt = 0;

        loop {
            if self.acquire(name, &token).await? {
                debug!(lock = %name, attempts = attempt + 1, "Distributed lock acquired");
                return Ok(LockHandle::new(name, token));
            }

            let mut pause = backoff(self.poll_interval, attempt);
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(AppError::lock_timeout(format!(
                        "Timed out waiting for lock {}",
                        name
                    )));
                }
                pause = pause.min(deadline - now);
            }
            sleep(pause).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn try_lock(&self, name: &str) -> AppResult<Option<LockHandle>> {
        let token = Uuid::new_v4().to_string();
        if self.acquire(name, &token).await? {
            Ok(Some(LockHandle::new(name, token)))
        } else {
            Ok(None)
        }
    }

    async fn unlock(&self, handle: LockHandle) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .release_script()
            .key(handle.name())
            .arg(handle.token())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis lock release failed: {}", e)))?;

        Ok(removed == 1)
    }
}

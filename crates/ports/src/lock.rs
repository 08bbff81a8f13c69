//! 分布式锁 trait 定义

use async_trait::async_trait;
use dcache_errors::AppResult;

/// 已持有的锁
///
/// `token` 唯一标识本次持有，释放时只删除自己持有的锁。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    name: String,
    token: String,
}

impl LockHandle {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// 分布式锁 trait
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 阻塞获取锁，直到成功或超过实现配置的最长等待时间
    ///
    /// 锁服务故障返回 `Infrastructure`，等待超时返回 `LockTimeout`。
    async fn lock(&self, name: &str) -> AppResult<LockHandle>;

    /// 尝试获取锁，不等待
    async fn try_lock(&self, name: &str) -> AppResult<Option<LockHandle>>;

    /// 释放锁，返回锁是否仍由该 handle 持有
    async fn unlock(&self, handle: LockHandle) -> AppResult<bool>;
}

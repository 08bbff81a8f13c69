//! 调用方提供的回调能力

use std::future::Future;

use async_trait::async_trait;
use dcache_errors::AppResult;

/// 缓存未命中时计算规范值
///
/// 返回 `Ok(None)` 表示数据源中确实没有该值，这不是错误。
/// 任何 `FnOnce() -> impl Future<Output = anyhow::Result<Option<T>>>` 闭包都自动实现本 trait。
pub trait CacheLoader<T>: Send {
    type Future: Future<Output = anyhow::Result<Option<T>>> + Send;

    fn load(self) -> Self::Future;
}

impl<T, F, Fut> CacheLoader<T> for F
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
{
    type Future = Fut;

    fn load(self) -> Fut {
        self()
    }
}

/// 读取结果校验过滤器
///
/// 返回 `true` 表示接受当前（可能为空的）结果，不再重新计算。
/// 配合不可删除的布隆过滤器使用：已确认不存在的 key 由这里拦截。
#[async_trait]
pub trait CacheGetFilter: Send + Sync {
    async fn filter(&self, key: &str) -> AppResult<bool>;
}

#[async_trait]
impl<F> CacheGetFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn filter(&self, key: &str) -> AppResult<bool> {
        Ok(self(key))
    }
}

/// 重新计算仍无结果时的回调
#[async_trait]
pub trait CacheGetIfAbsent: Send + Sync {
    async fn on_absent(&self, key: &str) -> AppResult<()>;
}

#[async_trait]
impl<F> CacheGetIfAbsent for F
where
    F: Fn(&str) + Send + Sync,
{
    async fn on_absent(&self, key: &str) -> AppResult<()> {
        self(key);
        Ok(())
    }
}

//! 布隆过滤器 trait 定义

use async_trait::async_trait;
use dcache_errors::AppResult;

/// 只增不删的概率集合
///
/// `contains` 返回 `false` 表示一定不存在；返回 `true` 只表示可能存在。
#[async_trait]
pub trait BloomFilter: Send + Sync {
    /// 添加元素，返回是否为新加入
    async fn add(&self, item: &str) -> AppResult<bool>;

    /// 检查元素是否可能存在
    async fn contains(&self, item: &str) -> AppResult<bool>;
}

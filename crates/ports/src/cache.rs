//! Cache trait 定义

use std::any::Any;

use async_trait::async_trait;
use dcache_common::Ttl;
use dcache_errors::AppResult;

use crate::CacheValue;

/// 最小的同步键值缓存契约，不带任何击穿防护
///
/// 值以字符串形式存储；类型化读写见 [`CacheExt`]。
#[async_trait]
pub trait Cache: Send + Sync {
    /// 获取原始字符串值
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// 写入值；`ttl` 为 `None` 时使用存储配置的默认过期时间
    async fn put(&self, key: &str, value: &str, ttl: Option<Ttl>) -> AppResult<()>;

    /// 原子地检查 `keys` 全部不存在，并在同一步中占用它们
    ///
    /// 任何一个 key 已存在时返回 `false`，且不会占用其余 key。
    async fn put_if_all_absent(&self, keys: &[&str]) -> AppResult<bool>;

    /// 删除单个 key，返回是否确实删除
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// 批量删除，返回实际删除的数量
    async fn delete_many(&self, keys: &[&str]) -> AppResult<u64>;

    /// 检查是否存在
    async fn has_key(&self, key: &str) -> AppResult<bool>;

    /// 统计存在的 key 数量
    async fn count_existing_keys(&self, keys: &[&str]) -> AppResult<u64>;

    /// 底层存储实例，供管理类操作向下转型使用，不在本抽象的安全保证之内
    fn instance(&self) -> &dyn Any;
}

/// 类型化读写，对所有 [`Cache`] 自动可用
#[async_trait]
pub trait CacheExt: Cache {
    /// 读取并解码为 `T`；字符串类型不经过 JSON 解码
    async fn get_as<T: CacheValue>(&self, key: &str) -> AppResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => T::decode(raw).map(Some),
            None => Ok(None),
        }
    }

    /// 编码并写入，返回是否真正写入；编码结果没有有效载荷时跳过写入
    async fn put_value<T: CacheValue>(&self, key: &str, value: &T, ttl: Option<Ttl>) -> AppResult<bool> {
        match value.encode()? {
            Some(payload) => {
                self.put(key, &payload, ttl).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

//! DistributedCache trait 定义
//!
//! 在 [`Cache`] 之上提供两类读取：
//! - `get_or_load`：普通 cache-aside，不加锁，只适合内部低流量调用
//! - `safe_get`：防穿透 / 防击穿的读取，对外暴露的调用点应使用它

use std::fmt;

use async_trait::async_trait;
use dcache_common::Ttl;
use dcache_errors::AppResult;

use crate::{BloomFilter, Cache, CacheGetFilter, CacheGetIfAbsent, CacheLoader, CacheValue};

/// 空白值的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlankPolicy {
    /// 空白字符串等同于不存在：不缓存，并触发未命中回调
    #[default]
    Absent,
    /// 任何有载荷的 `Some` 都是有效值，包括空字符串
    Value,
}

impl BlankPolicy {
    /// 判断一个读到或加载到的值是否算「找到」
    pub fn is_found<T: CacheValue>(self, value: &T) -> bool {
        if !value.has_payload() {
            return false;
        }
        match self {
            Self::Absent => !value.is_blank(),
            Self::Value => true,
        }
    }
}

/// `safe_get` 的可选参数
#[derive(Clone, Copy, Default)]
pub struct SafeGetOptions<'a> {
    /// 过期时间，`None` 使用配置的默认值
    pub ttl: Option<Ttl>,
    /// 布隆过滤器：不包含的 key 直接返回空
    pub bloom_filter: Option<&'a dyn BloomFilter>,
    /// 校验过滤器：先于布隆过滤器判断
    pub validity_filter: Option<&'a dyn CacheGetFilter>,
    /// loader 无结果时的回调
    pub on_miss: Option<&'a dyn CacheGetIfAbsent>,
    pub blank: BlankPolicy,
}

impl<'a> SafeGetOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn bloom_filter(mut self, bloom_filter: &'a dyn BloomFilter) -> Self {
        self.bloom_filter = Some(bloom_filter);
        self
    }

    pub fn validity_filter(mut self, filter: &'a dyn CacheGetFilter) -> Self {
        self.validity_filter = Some(filter);
        self
    }

    pub fn on_miss(mut self, callback: &'a dyn CacheGetIfAbsent) -> Self {
        self.on_miss = Some(callback);
        self
    }

    pub fn blank(mut self, blank: BlankPolicy) -> Self {
        self.blank = blank;
        self
    }
}

impl fmt::Debug for SafeGetOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeGetOptions")
            .field("ttl", &self.ttl)
            .field("bloom_filter", &self.bloom_filter.is_some())
            .field("validity_filter", &self.validity_filter.is_some())
            .field("on_miss", &self.on_miss.is_some())
            .field("blank", &self.blank)
            .finish()
    }
}

/// 分布式缓存
#[async_trait]
pub trait DistributedCache: Cache {
    /// cache-aside 读取，未命中时调用 loader 并按 `ttl` 写回
    ///
    /// 不加锁：并发未命中会各自调用 loader。
    async fn get_or_load<T, L>(&self, key: &str, loader: L, ttl: Ttl) -> AppResult<Option<T>>
    where
        T: CacheValue,
        L: CacheLoader<T>;

    /// 带击穿 / 穿透防护的读取
    ///
    /// 1. 快速路径：命中直接返回，不加锁
    /// 2. 校验过滤器接受 → 返回当前结果；布隆过滤器不包含 → 返回空
    /// 3. 获取 `<lock-prefix><key>` 分布式锁，二次检查
    /// 4. 仍未命中则调用 loader，有值写回缓存和布隆过滤器，无值触发 `on_miss`
    /// 5. 无论成功、失败或 panic 都会释放锁；future 被取消时在后台释放，没有运行时则等租期到期
    async fn safe_get<T, L>(
        &self,
        key: &str,
        loader: L,
        options: SafeGetOptions<'_>,
    ) -> AppResult<Option<T>>
    where
        T: CacheValue,
        L: CacheLoader<T>;

    /// 先写缓存，再把 key 加入布隆过滤器
    async fn safe_put<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Ttl>,
        bloom_filter: Option<&dyn BloomFilter>,
    ) -> AppResult<()>;
}

//! 带击穿防护的分布式缓存实现

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dcache_common::{TimeUnit, Ttl, ensure_key, ensure_keys};
use dcache_config::CacheConfig;
use dcache_errors::{AppError, AppResult};
use dcache_ports::{
    BlankPolicy, BloomFilter, Cache, CacheExt, CacheLoader, CacheValue, DistributedCache,
    DistributedLock, LockHandle, SafeGetOptions,
};
use dcache_telemetry::{SafeGetOutcome, record_loader_call, record_lock_wait, record_safe_get};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::TtlJitter;

/// ProtectedCache 配置
#[derive(Debug, Clone)]
pub struct ProtectedCacheConfig {
    /// TTL 未指定单位时使用的默认单位
    pub default_unit: TimeUnit,
    /// `safe_get` 未指定 TTL 时使用的默认值
    pub default_ttl: Ttl,
    /// 分布式锁名前缀
    pub lock_prefix: String,
    /// 安全写入路径上的 TTL 抖动
    pub jitter: TtlJitter,
}

impl Default for ProtectedCacheConfig {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

impl From<&CacheConfig> for ProtectedCacheConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            default_unit: config.value_time_unit,
            default_ttl: config.default_ttl(),
            lock_prefix: config.lock.prefix.clone(),
            jitter: TtlJitter::new(config.ttl_jitter_ratio),
        }
    }
}

/// 防击穿 / 防穿透的分布式缓存
///
/// 同一个 key 的并发未命中只有一个调用方执行 loader，其余调用方
/// 等锁后通过二次检查拿到结果。
#[derive(Clone)]
pub struct ProtectedCache {
    cache: Arc<dyn Cache>,
    lock: Arc<dyn DistributedLock>,
    config: ProtectedCacheConfig,
}

impl ProtectedCache {
    pub fn new(cache: Arc<dyn Cache>, lock: Arc<dyn DistributedLock>) -> Self {
        Self {
            cache,
            lock,
            config: ProtectedCacheConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ProtectedCacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ProtectedCacheConfig {
        &self.config
    }

    /// 被保护的底层缓存
    pub fn inner(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    fn lock_name(&self, key: &str) -> String {
        format!("{}{}", self.config.lock_prefix, key)
    }

    fn resolve_ttl(&self, ttl: Ttl) -> AppResult<Duration> {
        ttl.resolve(self.config.default_unit)
    }

    /// 读取并按空白策略归一化：空白值视为未找到
    async fn read_found<T: CacheValue>(&self, key: &str, blank: BlankPolicy) -> AppResult<Option<T>> {
        let value = self.cache.get_as::<T>(key).await?;
        Ok(value.filter(|v| blank.is_found(v)))
    }

    async fn write_through<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        bloom_filter: Option<&dyn BloomFilter>,
    ) -> AppResult<()> {
        let ttl = self.config.jitter.apply(ttl);
        let written = self.cache.put_value(key, value, Some(store_ttl(ttl))).await?;
        // 先写值再标记，没写入就不标记
        if let (true, Some(bloom)) = (written, bloom_filter) {
            bloom.add(key).await?;
        }
        Ok(())
    }

    /// 持锁后的二次检查 + 加载
    async fn load_under_lock<T, L>(
        &self,
        key: &str,
        loader: L,
        ttl: Duration,
        options: &SafeGetOptions<'_>,
    ) -> AppResult<Option<T>>
    where
        T: CacheValue,
        L: CacheLoader<T>,
    {
        if let Some(value) = self.read_found::<T>(key, options.blank).await? {
            debug!(key, "Cache populated by another lock holder");
            record_safe_get(SafeGetOutcome::Waited);
            return Ok(Some(value));
        }

        record_loader_call();
        let loaded = loader.load().await.map_err(AppError::Loader)?;

        match loaded.filter(|v| options.blank.is_found(v)) {
            Some(value) => {
                self.write_through(key, &value, ttl, options.bloom_filter)
                    .await?;
                record_safe_get(SafeGetOutcome::Loaded);
                Ok(Some(value))
            }
            None => {
                if let Some(on_miss) = options.on_miss {
                    on_miss.on_absent(key).await?;
                }
                debug!(key, "Loader found no value");
                record_safe_get(SafeGetOutcome::Absent);
                Ok(None)
            }
        }
    }

}

/// 持有中的 safe_get 锁
///
/// 正常路径调用 [`HeldLock::release`]。调用方取消 future 时在 drop 中交给当前
/// tokio 运行时异步释放；没有运行时则只能等租期到期。
struct HeldLock {
    lock: Arc<dyn DistributedLock>,
    handle: Option<LockHandle>,
}

impl HeldLock {
    fn new(lock: Arc<dyn DistributedLock>, handle: LockHandle) -> Self {
        Self {
            lock,
            handle: Some(handle),
        }
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            release_lock(self.lock.as_ref(), handle).await;
        }
    }
}

impl Drop for HeldLock {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(lock = %handle.name(), "safe_get cancelled, releasing lock in background");
                let lock = self.lock.clone();
                runtime.spawn(async move {
                    release_lock(lock.as_ref(), handle).await;
                });
            }
            Err(_) => warn!(
                lock = %handle.name(),
                "safe_get cancelled outside a runtime, lock held until lease expiry"
            ),
        }
    }
}

async fn release_lock(lock: &dyn DistributedLock, handle: LockHandle) {
    let name = handle.name().to_string();
    match lock.unlock(handle).await {
        Ok(true) => debug!(lock = %name, "safe_get lock released"),
        Ok(false) => warn!(lock = %name, "safe_get lock lease expired before release"),
        Err(e) => warn!(
            lock = %name,
            error = %e,
            "Failed to release safe_get lock, relying on lease expiry"
        ),
    }
}

/// 存储层统一使用毫秒 TTL
fn store_ttl(ttl: Duration) -> Ttl {
    Ttl::millis(ttl.as_millis().max(1) as u64)
}

#[async_trait]
impl Cache for ProtectedCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        ensure_key(key)?;
        self.cache.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Ttl>) -> AppResult<()> {
        ensure_key(key)?;
        match ttl {
            Some(ttl) => {
                let ttl = self.resolve_ttl(ttl)?;
                self.cache.put(key, value, Some(store_ttl(ttl))).await
            }
            None => self.cache.put(key, value, None).await,
        }
    }

    async fn put_if_all_absent(&self, keys: &[&str]) -> AppResult<bool> {
        ensure_keys(keys)?;
        self.cache.put_if_all_absent(keys).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        ensure_key(key)?;
        self.cache.delete(key).await
    }

    async fn delete_many(&self, keys: &[&str]) -> AppResult<u64> {
        ensure_keys(keys)?;
        self.cache.delete_many(keys).await
    }

    async fn has_key(&self, key: &str) -> AppResult<bool> {
        ensure_key(key)?;
        self.cache.has_key(key).await
    }

    async fn count_existing_keys(&self, keys: &[&str]) -> AppResult<u64> {
        ensure_keys(keys)?;
        self.cache.count_existing_keys(keys).await
    }

    fn instance(&self) -> &dyn Any {
        self.cache.instance()
    }
}

#[async_trait]
impl DistributedCache for ProtectedCache {
    async fn get_or_load<T, L>(&self, key: &str, loader: L, ttl: Ttl) -> AppResult<Option<T>>
    where
        T: CacheValue,
        L: CacheLoader<T>,
    {
        ensure_key(key)?;
        let ttl = self.resolve_ttl(ttl)?;

        if let Some(value) = self.read_found::<T>(key, BlankPolicy::Absent).await? {
            return Ok(Some(value));
        }

        record_loader_call();
        let loaded = loader.load().await.map_err(AppError::Loader)?;
        match loaded.filter(|v| BlankPolicy::Absent.is_found(v)) {
            Some(value) => {
                self.cache
                    .put_value(key, &value, Some(store_ttl(ttl)))
                    .await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn safe_get<T, L>(
        &self,
        key: &str,
        loader: L,
        options: SafeGetOptions<'_>,
    ) -> AppResult<Option<T>>
    where
        T: CacheValue,
        L: CacheLoader<T>,
    {
        ensure_key(key)?;
        let ttl = self.resolve_ttl(options.ttl.unwrap_or(self.config.default_ttl))?;

        if let Some(value) = self.read_found::<T>(key, options.blank).await? {
            record_safe_get(SafeGetOutcome::Hit);
            return Ok(Some(value));
        }

        // 校验过滤器优先于布隆过滤器
        if let Some(filter) = options.validity_filter {
            if filter.filter(key).await? {
                debug!(key, "Validity filter accepted empty result");
                record_safe_get(SafeGetOutcome::Filtered);
                return Ok(None);
            }
        }
        if let Some(bloom) = options.bloom_filter {
            if !bloom.contains(key).await? {
                debug!(key, "Bloom filter rejected key");
                record_safe_get(SafeGetOutcome::BloomRejected);
                return Ok(None);
            }
        }

        let started = Instant::now();
        let handle = self.lock.lock(&self.lock_name(key)).await?;
        record_lock_wait(started.elapsed());
        let held = HeldLock::new(self.lock.clone(), handle);

        let outcome = AssertUnwindSafe(self.load_under_lock(key, loader, ttl, &options))
            .catch_unwind()
            .await;
        held.release().await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn safe_put<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Ttl>,
        bloom_filter: Option<&dyn BloomFilter>,
    ) -> AppResult<()> {
        ensure_key(key)?;
        let ttl = self.resolve_ttl(ttl.unwrap_or(self.config.default_ttl))?;
        self.write_through(key, value, ttl, bloom_filter).await
    }
}

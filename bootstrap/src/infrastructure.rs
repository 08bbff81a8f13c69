//! 缓存基础设施资源
//!
//! 一个 Redis 连接供缓存、锁和布隆过滤器共享。

use std::sync::Arc;
use std::time::Duration;

use dcache_adapter_redis::{
    BitmapBloomFilter, RedisCache, RedisDistributedLock, check_connection,
    create_connection_manager,
};
use dcache_config::AppConfig;
use dcache_core::{ProtectedCache, ProtectedCacheConfig};
use dcache_errors::AppResult;
use dcache_ports::BloomFilter;
use redis::aio::ConnectionManager;
use secrecy::ExposeSecret;
use tracing::info;

use crate::retry::{RetryPolicy, with_retry};

/// 缓存基础设施容器
pub struct CacheInfrastructure {
    config: AppConfig,
    redis_conn: ConnectionManager,
    cache: Arc<RedisCache>,
    lock: Arc<RedisDistributedLock>,
    /// 默认的防穿透布隆过滤器
    penetration_filter: Arc<BitmapBloomFilter>,
    protected: Arc<ProtectedCache>,
}

impl CacheInfrastructure {
    /// 从配置创建（连接 Redis 时带重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        Self::from_config_with_retry(config, &RetryPolicy::default()).await
    }

    pub async fn from_config_with_retry(config: AppConfig, policy: &RetryPolicy) -> AppResult<Self> {
        let redis_conn = with_retry(policy, "Redis connection", || {
            let url = config.redis.url.expose_secret().clone();
            async move { create_connection_manager(&url).await }
        })
        .await?;

        Ok(Self::from_connection(config, redis_conn))
    }

    /// 用已有连接装配各组件
    pub fn from_connection(config: AppConfig, redis_conn: ConnectionManager) -> Self {
        let cache_config = &config.cache;

        let cache = Arc::new(RedisCache::from_config(redis_conn.clone(), cache_config));
        let lock = Arc::new(RedisDistributedLock::from_config(
            redis_conn.clone(),
            &cache_config.lock,
        ));
        let penetration_filter = Arc::new(BitmapBloomFilter::from_config(
            redis_conn.clone(),
            &cache_config.bloom_filter,
        ));
        info!(
            filter = %penetration_filter.name(),
            bits = penetration_filter.size(),
            hashes = penetration_filter.num_hashes(),
            "Penetration bloom filter configured"
        );

        let protected = Arc::new(
            ProtectedCache::new(cache.clone(), lock.clone())
                .with_config(ProtectedCacheConfig::from(cache_config)),
        );

        Self {
            config,
            redis_conn,
            cache,
            lock,
            penetration_filter,
            protected,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Redis 连接（克隆开销很小）
    pub fn redis_connection(&self) -> ConnectionManager {
        self.redis_conn.clone()
    }

    /// 不带防护的底层缓存
    pub fn cache(&self) -> Arc<RedisCache> {
        self.cache.clone()
    }

    pub fn lock(&self) -> Arc<RedisDistributedLock> {
        self.lock.clone()
    }

    pub fn penetration_filter(&self) -> Arc<BitmapBloomFilter> {
        self.penetration_filter.clone()
    }

    /// 供 `SafeGetOptions::bloom_filter` 使用
    pub fn penetration_filter_ref(&self) -> &dyn BloomFilter {
        self.penetration_filter.as_ref()
    }

    /// 带击穿防护的分布式缓存
    pub fn protected_cache(&self) -> Arc<ProtectedCache> {
        self.protected.clone()
    }

    /// PING Redis，返回延迟
    pub async fn health_check(&self) -> AppResult<Duration> {
        let mut conn = self.redis_conn.clone();
        check_connection(&mut conn).await
    }
}

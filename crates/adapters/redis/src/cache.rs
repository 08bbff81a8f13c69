//! Redis Cache 实现

use std::any::Any;
use std::sync::OnceLock;

use async_trait::async_trait;
use dcache_common::{TimeUnit, Ttl, ensure_key, ensure_keys};
use dcache_config::CacheConfig;
use dcache_errors::{AppError, AppResult};
use dcache_ports::Cache;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

/// 原子地检查所有 key 都不存在，再逐个以占位值写入
///
/// KEYS: 待占用的 key；ARGV[1]: 过期时间（毫秒）
pub const PUT_IF_ALL_ABSENT_SCRIPT: &str = r"
for _, key in ipairs(KEYS) do
    if redis.call('EXISTS', key) == 1 then
        return 0
    end
end
for _, key in ipairs(KEYS) do
    redis.call('SET', key, 'default', 'PX', ARGV[1])
end
return 1
";

/// Redis Cache
pub struct RedisCache {
    conn: ConnectionManager,
    key_prefix: String,
    default_ttl: Ttl,
    default_unit: TimeUnit,
    /// 脚本只编译一次，由实例持有
    put_if_all_absent: OnceLock<Script>,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        let config = CacheConfig::default();
        Self {
            conn,
            key_prefix: config.prefix.clone(),
            default_ttl: config.default_ttl(),
            default_unit: config.value_time_unit,
            put_if_all_absent: OnceLock::new(),
        }
    }

    /// 按缓存配置设置前缀和默认过期时间
    pub fn from_config(conn: ConnectionManager, config: &CacheConfig) -> Self {
        Self::new(conn)
            .with_prefix(config.prefix.clone())
            .with_default_ttl(config.default_ttl())
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        if let Some(unit) = ttl.unit {
            self.default_unit = unit;
        }
        self.default_ttl = ttl;
        self
    }

    /// 底层连接，供管理类操作使用
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn full_keys(&self, keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| self.full_key(key)).collect()
    }

    fn ttl_millis(&self, ttl: Option<Ttl>) -> AppResult<u64> {
        let duration = ttl
            .unwrap_or(self.default_ttl)
            .resolve(self.default_unit)?;
        Ok(duration.as_millis() as u64)
    }

    fn put_if_all_absent_script(&self) -> &Script {
        self.put_if_all_absent
            .get_or_init(|| Script::new(PUT_IF_ALL_ABSENT_SCRIPT))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        ensure_key(key)?;
        let mut conn = self.conn.clone();
        conn.get(self.full_key(key))
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis get failed: {}", e)))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Ttl>) -> AppResult<()> {
        ensure_key(key)?;
        let millis = self.ttl_millis(ttl)?;
        let mut conn = self.conn.clone();
        conn.pset_ex(self.full_key(key), value, millis)
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis set failed: {}", e)))
    }

    async fn put_if_all_absent(&self, keys: &[&str]) -> AppResult<bool> {
        ensure_keys(keys)?;
        if keys.is_empty() {
            return Ok(true);
        }
        let millis = self.ttl_millis(None)?;
        let mut conn = self.conn.clone();

        let mut invocation = self.put_if_all_absent_script().prepare_invoke();
        for key in self.full_keys(keys) {
            invocation.key(key);
        }
        invocation.arg(millis);

        let claimed: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis put_if_all_absent failed: {}", e)))?;
        Ok(claimed == 1)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        ensure_key(key)?;
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .del(self.full_key(key))
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis delete failed: {}", e)))?;
        Ok(removed > 0)
    }

    async fn delete_many(&self, keys: &[&str]) -> AppResult<u64> {
        ensure_keys(keys)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(self.full_keys(keys))
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis delete failed: {}", e)))
    }

    async fn has_key(&self, key: &str) -> AppResult<bool> {
        ensure_key(key)?;
        let mut conn = self.conn.clone();
        conn.exists(self.full_key(key))
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis exists failed: {}", e)))
    }

    async fn count_existing_keys(&self, keys: &[&str]) -> AppResult<u64> {
        ensure_keys(keys)?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.exists(self.full_keys(keys))
            .await
            .map_err(|e| AppError::infrastructure(format!("Redis exists failed: {}", e)))
    }

    fn instance(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_checks_before_writing() {
        let check = PUT_IF_ALL_ABSENT_SCRIPT.find("EXISTS").unwrap();
        let write = PUT_IF_ALL_ABSENT_SCRIPT.find("'SET'").unwrap();
        assert!(check < write);
        assert!(PUT_IF_ALL_ABSENT_SCRIPT.contains("'PX', ARGV[1]"));
    }
}

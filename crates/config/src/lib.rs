//! dcache-config - 配置加载库
//!
//! 加载顺序：`default.toml` → `<APP_ENV>.toml` → `DCACHE_` 前缀的环境变量（`__` 表示嵌套）。

use dcache_common::{TimeUnit, Ttl};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// 布隆过滤器（防穿透）配置
#[derive(Debug, Clone, Deserialize)]
pub struct BloomFilterConfig {
    /// 过滤器名称（Redis key）
    #[serde(default = "default_bloom_name")]
    pub name: String,
    /// 预期插入数量
    #[serde(default = "default_expected_insertions")]
    pub expected_insertions: u64,
    /// 期望误判率
    #[serde(default = "default_false_probability")]
    pub false_probability: f64,
}

fn default_bloom_name() -> String {
    "cache_penetration_bloom_filter".to_string()
}

fn default_expected_insertions() -> u64 {
    64
}

fn default_false_probability() -> f64 {
    0.03
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self {
            name: default_bloom_name(),
            expected_insertions: default_expected_insertions(),
            false_probability: default_false_probability(),
        }
    }
}

/// safe_get 使用的分布式锁配置
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// 锁名前缀，实际锁名为 `<prefix><key>`
    #[serde(default = "default_lock_prefix")]
    pub prefix: String,
    /// 最长等待时间（毫秒），0 表示无限等待
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    /// 锁租期（毫秒），持有者崩溃后锁最迟在此之后自动释放
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,
    /// 抢锁失败后的轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_lock_prefix() -> String {
    "safe_get_distributed_lock_get:".to_string()
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_lease_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            prefix: default_lock_prefix(),
            wait_timeout_ms: default_wait_timeout_ms(),
            lease_ms: default_lease_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LockConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 所有 key 的统一前缀
    #[serde(default)]
    pub prefix: String,
    /// 默认过期时间数值
    #[serde(default = "default_value_timeout")]
    pub value_timeout: u64,
    /// 默认过期时间单位
    #[serde(default)]
    pub value_time_unit: TimeUnit,
    /// TTL 随机抖动比例，0 表示关闭
    #[serde(default)]
    pub ttl_jitter_ratio: f64,
    #[serde(default)]
    pub bloom_filter: BloomFilterConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

fn default_value_timeout() -> u64 {
    30 * 1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            value_timeout: default_value_timeout(),
            value_time_unit: TimeUnit::default(),
            ttl_jitter_ratio: 0.0,
            bloom_filter: BloomFilterConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

impl CacheConfig {
    /// 裸 `put` 使用的默认 TTL
    pub fn default_ttl(&self) -> Ttl {
        Ttl::new(self.value_timeout, self.value_time_unit)
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("DCACHE_").split("__"));

        Self::from_figment(figment)
    }

    /// 从任意 figment 提取并校验
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        if cache.value_timeout == 0 {
            return Err(ConfigError::Invalid(
                "cache.value_timeout must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&cache.ttl_jitter_ratio) {
            return Err(ConfigError::Invalid(
                "cache.ttl_jitter_ratio must be within [0, 1)".to_string(),
            ));
        }
        let bloom = &cache.bloom_filter;
        if bloom.expected_insertions == 0 {
            return Err(ConfigError::Invalid(
                "cache.bloom_filter.expected_insertions must be greater than zero".to_string(),
            ));
        }
        if !(bloom.false_probability > 0.0 && bloom.false_probability < 1.0) {
            return Err(ConfigError::Invalid(
                "cache.bloom_filter.false_probability must be within (0, 1)".to_string(),
            ));
        }
        if cache.lock.lease_ms == 0 || cache.lock.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "cache.lock lease and poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

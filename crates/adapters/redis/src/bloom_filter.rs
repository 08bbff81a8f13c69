//! 布隆过滤器实现
//!
//! 用于防止缓存穿透：确定不存在的 key 不会触发加载。
//! - [`RedisBloomFilter`] 依赖 RedisBloom 模块
//! - [`BitmapBloomFilter`] 只使用 `SETBIT/GETBIT`，任何 Redis 都可用

use std::sync::OnceLock;

use async_trait::async_trait;
use dcache_config::BloomFilterConfig;
use dcache_errors::{AppError, AppResult};
use dcache_ports::BloomFilter;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

/// 基于 RedisBloom 的布隆过滤器
pub struct RedisBloomFilter {
    conn: ConnectionManager,
    name: String,
    expected_items: u64,
    false_positive_rate: f64,
}

impl RedisBloomFilter {
    pub fn new(
        conn: ConnectionManager,
        name: impl Into<String>,
        expected_items: u64,
        false_positive_rate: f64,
    ) -> Self {
        Self {
            conn,
            name: name.into(),
            expected_items,
            false_positive_rate,
        }
    }

    pub fn from_config(conn: ConnectionManager, config: &BloomFilterConfig) -> Self {
        Self::new(
            conn,
            config.name.clone(),
            config.expected_insertions,
            config.false_probability,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// BF.RESERVE，过滤器已存在时视为成功
    pub async fn reserve(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let result: Result<String, redis::RedisError> = redis::cmd("BF.RESERVE")
            .arg(&self.name)
            .arg(self.false_positive_rate)
            .arg(self.expected_items)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                debug!(filter = %self.name, "Bloom filter reserved");
                Ok(())
            }
            Err(e) if e.to_string().contains("item exists") => Ok(()),
            Err(e) => Err(AppError::infrastructure(format!(
                "Failed to reserve bloom filter: {}",
                e
            ))),
        }
    }

    pub async fn info(&self) -> AppResult<BloomFilterInfo> {
        let mut conn = self.conn.clone();
        let fields: Vec<Value> = redis::cmd("BF.INFO")
            .arg(&self.name)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Failed to get bloom filter info: {}", e)))?;

        Ok(BloomFilterInfo::from_fields(&fields))
    }
}

#[async_trait]
impl BloomFilter for RedisBloomFilter {
    async fn add(&self, item: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        redis::cmd("BF.ADD")
            .arg(&self.name)
            .arg(item)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Failed to add to bloom filter: {}", e)))
    }

    async fn contains(&self, item: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        redis::cmd("BF.EXISTS")
            .arg(&self.name)
            .arg(item)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Failed to check bloom filter: {}", e)))
    }
}

/// BF.INFO 返回的统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BloomFilterInfo {
    pub capacity: u64,
    /// 字节
    pub size: u64,
    pub num_filters: u64,
    pub num_items: u64,
}

impl BloomFilterInfo {
    /// 解析 `name, value, name, value...` 形式的回复，未知字段忽略
    fn from_fields(fields: &[Value]) -> Self {
        let mut info = Self::default();
        for pair in fields.chunks_exact(2) {
            let name = match &pair[0] {
                Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                Value::SimpleString(s) => s.clone(),
                _ => continue,
            };
            let Value::Int(value) = pair[1] else {
                continue;
            };
            let value = value.max(0) as u64;
            match name.as_str() {
                "Capacity" => info.capacity = value,
                "Size" => info.size = value,
                "Number of filters" => info.num_filters = value,
                "Number of items inserted" => info.num_items = value,
                _ => {}
            }
        }
        info
    }
}

/// 设置全部位，返回是否有位从 0 变为 1
const BITMAP_ADD_SCRIPT: &str = r"
local changed = 0
for i = 1, #ARGV do
    if redis.call('SETBIT', KEYS[1], ARGV[i], 1) == 0 then
        changed = 1
    end
end
return changed
";

const BITMAP_CONTAINS_SCRIPT: &str = r"
for i = 1, #ARGV do
    if redis.call('GETBIT', KEYS[1], ARGV[i]) == 0 then
        return 0
    end
end
return 1
";

/// 基于 Redis bitmap 的布隆过滤器
///
/// 位置由 SHA-256 摘要拆出的两个 64 位哈希做双重哈希得到，
/// 同一元素在任何进程中都落在相同的位上。
pub struct BitmapBloomFilter {
    conn: ConnectionManager,
    name: String,
    /// bitmap 大小（位）
    size: u64,
    num_hashes: u32,
    add_script: OnceLock<Script>,
    contains_script: OnceLock<Script>,
}

impl BitmapBloomFilter {
    /// 根据预期元素数量和误判率计算最优参数
    pub fn new(
        conn: ConnectionManager,
        name: impl Into<String>,
        expected_items: u64,
        false_positive_rate: f64,
    ) -> Self {
        let size = optimal_size(expected_items, false_positive_rate);
        let num_hashes = optimal_num_hashes(size, expected_items);

        Self {
            conn,
            name: name.into(),
            size,
            num_hashes,
            add_script: OnceLock::new(),
            contains_script: OnceLock::new(),
        }
    }

    pub fn from_config(conn: ConnectionManager, config: &BloomFilterConfig) -> Self {
        Self::new(
            conn,
            config.name.clone(),
            config.expected_insertions,
            config.false_probability,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// 删除整个 bitmap
    pub async fn clear(&self) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del(&self.name)
            .await
            .map_err(|e| AppError::infrastructure(format!("Failed to clear bloom filter: {}", e)))
    }

    fn positions(&self, item: &str) -> Vec<u64> {
        bit_positions(item, self.size, self.num_hashes)
    }

    async fn run(&self, script: &Script, item: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let result: i64 = script
            .key(&self.name)
            .arg(self.positions(item))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::infrastructure(format!("Bloom filter script failed: {}", e)))?;
        Ok(result == 1)
    }
}

#[async_trait]
impl BloomFilter for BitmapBloomFilter {
    async fn add(&self, item: &str) -> AppResult<bool> {
        let script = self
            .add_script
            .get_or_init(|| Script::new(BITMAP_ADD_SCRIPT));
        self.run(script, item).await
    }

    async fn contains(&self, item: &str) -> AppResult<bool> {
        let script = self
            .contains_script
            .get_or_init(|| Script::new(BITMAP_CONTAINS_SCRIPT));
        self.run(script, item).await
    }
}

/// m = -n * ln(p) / (ln(2)^2)
fn optimal_size(n: u64, p: f64) -> u64 {
    let m = -(n.max(1) as f64) * p.ln() / (2.0_f64.ln().powi(2));
    (m.ceil() as u64).max(1)
}

/// k = (m / n) * ln(2)
fn optimal_num_hashes(m: u64, n: u64) -> u32 {
    let k = (m as f64 / n.max(1) as f64) * 2.0_f64.ln();
    k.round().max(1.0) as u32
}

fn bit_positions(item: &str, size: u64, num_hashes: u32) -> Vec<u64> {
    let digest = Sha256::digest(item.as_bytes());
    let mut first = [0u8; 8];
    let mut second = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    second.copy_from_slice(&digest[8..16]);
    let h1 = u64::from_be_bytes(first);
    // 奇数步长，避免所有位置重合
    let h2 = u64::from_be_bytes(second) | 1;

    (0..num_hashes as u64)
        .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % size)
        .collect()
}

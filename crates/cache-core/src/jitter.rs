//! TTL 随机抖动
//!
//! 大量 key 使用同一 TTL 写入时会在同一时刻过期（缓存雪崩）。
//! 例如：TTL 300 秒、比例 0.1，实际 TTL 在 270-330 秒之间。

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtlJitter {
    ratio: f64,
}

impl TtlJitter {
    /// `ratio` 超出 [0, 1) 时按边界截断
    pub fn new(ratio: f64) -> Self {
        let ratio = if ratio.is_finite() { ratio.clamp(0.0, 0.99) } else { 0.0 };
        Self { ratio }
    }

    pub fn disabled() -> Self {
        Self { ratio: 0.0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.ratio > 0.0
    }

    /// 为 TTL 添加 ±ratio 的随机抖动，结果至少 1 毫秒
    pub fn apply(&self, ttl: Duration) -> Duration {
        if !self.is_enabled() {
            return ttl;
        }

        let base = ttl.as_millis() as f64;
        let spread = base * self.ratio;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((base + offset).max(1.0) as u64)
    }
}

impl Default for TtlJitter {
    fn default() -> Self {
        Self::disabled()
    }
}

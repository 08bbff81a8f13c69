//! 过期时间（TTL）类型
//!
//! 缓存条目的 TTL 总是「数值 + 单位」。未指定单位时由存储配置的默认单位补全。

use std::time::Duration;

use derive_more::Display;
use dcache_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// 时间单位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    #[display("milliseconds")]
    Milliseconds,
    #[display("seconds")]
    Seconds,
    #[display("minutes")]
    Minutes,
    #[display("hours")]
    Hours,
    #[display("days")]
    Days,
}

impl TimeUnit {
    /// 将给定数量的本单位换算为 `Duration`
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            Self::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

/// 缓存过期时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ttl {
    pub amount: u64,
    /// `None` 表示使用存储配置的默认单位
    pub unit: Option<TimeUnit>,
}

impl Ttl {
    pub fn new(amount: u64, unit: TimeUnit) -> Self {
        Self {
            amount,
            unit: Some(unit),
        }
    }

    /// 只给出数值，单位稍后由默认配置补全
    pub fn of(amount: u64) -> Self {
        Self { amount, unit: None }
    }

    pub fn millis(amount: u64) -> Self {
        Self::new(amount, TimeUnit::Milliseconds)
    }

    pub fn seconds(amount: u64) -> Self {
        Self::new(amount, TimeUnit::Seconds)
    }

    pub fn minutes(amount: u64) -> Self {
        Self::new(amount, TimeUnit::Minutes)
    }

    /// 解析为具体时长；零 TTL 会产生一个永不过期或立即过期的条目，直接拒绝
    pub fn resolve(&self, default_unit: TimeUnit) -> AppResult<Duration> {
        if self.amount == 0 {
            return Err(AppError::configuration("cache timeout must be greater than zero"));
        }
        let unit = self.unit.unwrap_or(default_unit);
        let duration = unit.to_duration(self.amount);
        if duration.as_millis() == 0 {
            return Err(AppError::configuration(format!(
                "cache timeout {} {} is below one millisecond",
                self.amount, unit
            )));
        }
        Ok(duration)
    }
}

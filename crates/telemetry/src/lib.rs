//! telemetry - 可观测性库
//!
//! 日志初始化、Prometheus 指标导出，以及缓存层使用的指标名称。

use std::time::Duration;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const SAFE_GET_TOTAL: &str = "dcache_safe_get_total";
pub const LOADER_CALLS_TOTAL: &str = "dcache_loader_calls_total";
pub const LOCK_WAIT_SECONDS: &str = "dcache_lock_wait_seconds";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install Prometheus recorder: {0}")]
    Recorder(String),
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle, TelemetryError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Recorder(e.to_string()))
}

/// safe_get 的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeGetOutcome {
    /// 快速路径命中（无锁）
    Hit,
    /// 校验过滤器接受了当前结果
    Filtered,
    /// 布隆过滤器判定不存在
    BloomRejected,
    /// 等锁后二次检查命中，由其他持锁者加载
    Waited,
    /// 持锁后由 loader 加载
    Loaded,
    /// loader 也没有结果
    Absent,
}

impl SafeGetOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Filtered => "filtered",
            Self::BloomRejected => "bloom_rejected",
            Self::Waited => "waited",
            Self::Loaded => "loaded",
            Self::Absent => "absent",
        }
    }
}

pub fn record_safe_get(outcome: SafeGetOutcome) {
    counter!(SAFE_GET_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_loader_call() {
    counter!(LOADER_CALLS_TOTAL).increment(1);
}

pub fn record_lock_wait(waited: Duration) {
    histogram!(LOCK_WAIT_SECONDS).record(waited.as_secs_f64());
}

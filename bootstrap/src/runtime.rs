//! 运行时初始化（日志、指标）

use dcache_config::AppConfig;
use dcache_errors::{AppError, AppResult};
use dcache_telemetry::{init_metrics, init_tracing, init_tracing_json};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

/// 按配置初始化 tracing，并记录生效的缓存参数
pub fn init_runtime(config: &AppConfig) {
    if config.telemetry.json {
        init_tracing_json(&config.telemetry.log_level);
    } else {
        init_tracing(&config.telemetry.log_level);
    }

    let cache = &config.cache;
    info!(
        prefix = %cache.prefix,
        value_timeout = cache.value_timeout,
        value_time_unit = %cache.value_time_unit,
        ttl_jitter_ratio = cache.ttl_jitter_ratio,
        lock_wait_timeout_ms = cache.lock.wait_timeout_ms,
        "Cache runtime initialized"
    );
}

/// 安装 Prometheus recorder，返回用于渲染指标的 handle
pub fn init_metrics_exporter() -> AppResult<PrometheusHandle> {
    init_metrics().map_err(|e| AppError::configuration(e.to_string()))
}

//! Redis 连接管理

use std::time::{Duration, Instant};

use dcache_errors::{AppError, AppResult};
use redis::aio::ConnectionManager;
use redis::{Client, ConnectionAddr};
use tracing::info;

/// 打开 Redis 连接（自动重连），日志中不输出密码
///
/// URL 格式错误返回 `Configuration`，不会被启动重试。
pub async fn create_connection_manager(url: &str) -> AppResult<ConnectionManager> {
    let client = Client::open(url)
        .map_err(|e| AppError::configuration(format!("Invalid Redis url: {}", e)))?;
    let endpoint = describe_endpoint(&client);

    let conn = ConnectionManager::new(client).await.map_err(|e| {
        AppError::infrastructure(format!("Failed to connect to Redis at {}: {}", endpoint, e))
    })?;
    info!(endpoint = %endpoint, "Redis connection manager created");
    Ok(conn)
}

/// PING 一次并返回往返延迟
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<Duration> {
    let started = Instant::now();
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| AppError::infrastructure(format!("Redis health check failed: {}", e)))?;
    Ok(started.elapsed())
}

fn describe_endpoint(client: &Client) -> String {
    let info = client.get_connection_info();
    let addr = match &info.addr {
        ConnectionAddr::Tcp(host, port) => format!("{}:{}", host, port),
        ConnectionAddr::TcpTls { host, port, .. } => format!("{}:{} (tls)", host, port),
        ConnectionAddr::Unix(path) => path.display().to_string(),
        #[allow(unreachable_patterns)]
        _ => "redis".to_string(),
    };
    format!("{}/{}", addr, info.redis.db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_url_is_configuration_error() {
        let err = create_connection_manager("not a redis url").await.err().unwrap();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(!err.is_retryable());
    }
}

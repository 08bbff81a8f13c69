//! Redis 集成测试
//!
//! 需要可用的 Redis（`REDIS_URL`，默认 `redis://127.0.0.1:6379`）：
//! `cargo test -p dcache-adapter-redis -- --ignored`

use std::env;
use std::sync::Arc;
use std::time::Duration;

use dcache_adapter_redis::{
    BitmapBloomFilter, RedisCache, RedisDistributedLock, check_connection,
    create_connection_manager,
};
use dcache_common::Ttl;
use dcache_core::ProtectedCache;
use dcache_errors::AppError;
use dcache_ports::{BloomFilter, Cache, DistributedCache, DistributedLock, SafeGetOptions};
use redis::aio::ConnectionManager;
use uuid::Uuid;

async fn connect() -> ConnectionManager {
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    create_connection_manager(&redis_url)
        .await
        .expect("Failed to create Redis connection manager")
}

/// 每个用例使用独立前缀，避免互相干扰
fn unique_prefix() -> String {
    format!("dcache-test:{}:", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_ping() {
    let mut conn = connect().await;
    let latency = check_connection(&mut conn).await.unwrap();
    assert!(latency < Duration::from_secs(5));
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_put_get_delete() {
    let cache = RedisCache::new(connect().await).with_prefix(unique_prefix());

    cache.put("a", "1", Some(Ttl::seconds(30))).await.unwrap();
    assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));
    assert!(cache.has_key("a").await.unwrap());
    assert_eq!(cache.count_existing_keys(&["a", "b"]).await.unwrap(), 1);

    assert!(cache.delete("a").await.unwrap());
    assert!(!cache.delete("a").await.unwrap());
    assert_eq!(cache.get("a").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_put_if_all_absent_is_all_or_nothing() {
    let cache = RedisCache::new(connect().await).with_prefix(unique_prefix());

    assert!(cache.put_if_all_absent(&["x", "y"]).await.unwrap());
    assert_eq!(cache.get("x").await.unwrap().as_deref(), Some("default"));

    assert!(!cache.put_if_all_absent(&["y", "z"]).await.unwrap());
    assert!(!cache.has_key("z").await.unwrap());

    assert_eq!(cache.delete_many(&["x", "y", "z"]).await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_ttl_expires() {
    let cache = RedisCache::new(connect().await).with_prefix(unique_prefix());

    cache.put("short", "v", Some(Ttl::millis(100))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(cache.get("short").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_lock_is_exclusive_and_token_checked() {
    let lock = RedisDistributedLock::new(connect().await)
        .with_wait_timeout(Some(Duration::from_millis(200)))
        .with_poll_interval(Duration::from_millis(20));
    let name = format!("{}lock", unique_prefix());

    let held = lock.lock(&name).await.unwrap();
    assert!(lock.try_lock(&name).await.unwrap().is_none());

    let err = lock.lock(&name).await.unwrap_err();
    assert!(matches!(err, AppError::LockTimeout(_)));

    let stale = dcache_ports::LockHandle::new(&name, "someone-else");
    assert!(!lock.unlock(stale).await.unwrap());

    assert!(lock.unlock(held).await.unwrap());
    let again = lock.try_lock(&name).await.unwrap().expect("lock should be free");
    assert!(lock.unlock(again).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn test_bitmap_bloom_filter() {
    let filter = BitmapBloomFilter::new(connect().await, format!("{}bloom", unique_prefix()), 64, 0.03);

    assert!(!filter.contains("user:1").await.unwrap());
    assert!(filter.add("user:1").await.unwrap());
    assert!(!filter.add("user:1").await.unwrap());
    assert!(filter.contains("user:1").await.unwrap());

    filter.clear().await.unwrap();
    assert!(!filter.contains("user:1").await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires a running Redis"]
async fn test_safe_get_loads_once_across_tasks() {
    let conn = connect().await;
    let prefix = unique_prefix();
    let cache = Arc::new(ProtectedCache::new(
        Arc::new(RedisCache::new(conn.clone()).with_prefix(prefix.clone())),
        Arc::new(RedisDistributedLock::new(conn)),
    ));
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .safe_get::<String, _>(
                    "hot",
                    move || async move {
                        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, anyhow::Error>(Some("loaded".to_string()))
                    },
                    SafeGetOptions::new().ttl(Ttl::seconds(30)),
                )
                .await
        }));
    }

    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value.as_deref(), Some("loaded"));
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    cache.delete("hot").await.unwrap();
}

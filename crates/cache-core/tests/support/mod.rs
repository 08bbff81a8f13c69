//! 测试用内存实现

#![allow(dead_code)]

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dcache_common::{TimeUnit, Ttl};
use dcache_errors::{AppError, AppResult};
use dcache_ports::{BloomFilter, Cache, DistributedLock, LockHandle};
use tokio::sync::Notify;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// 带过期时间的内存缓存
pub struct MemoryCache {
    data: Mutex<HashMap<String, Entry>>,
    default_ttl: Duration,
    pub puts: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_default_ttl(Duration::from_secs(30))
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            default_ttl,
            puts: AtomicUsize::new(0),
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// 剩余存活时间
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let data = self.data.lock().unwrap();
        data.get(key)
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    fn live(data: &HashMap<String, Entry>, key: &str) -> bool {
        data.get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Ttl>) -> AppResult<()> {
        let ttl = match ttl {
            Some(ttl) => ttl.resolve(TimeUnit::Milliseconds)?,
            None => self.default_ttl,
        };
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.data.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn put_if_all_absent(&self, keys: &[&str]) -> AppResult<bool> {
        let mut data = self.data.lock().unwrap();
        if keys.iter().any(|key| Self::live(&data, key)) {
            return Ok(false);
        }
        let expires_at = Instant::now() + self.default_ttl;
        for key in keys {
            data.insert(
                key.to_string(),
                Entry {
                    value: "default".to_string(),
                    expires_at,
                },
            );
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }

    async fn delete_many(&self, keys: &[&str]) -> AppResult<u64> {
        let mut data = self.data.lock().unwrap();
        Ok(keys.iter().filter(|key| data.remove(**key).is_some()).count() as u64)
    }

    async fn has_key(&self, key: &str) -> AppResult<bool> {
        Ok(Self::live(&self.data.lock().unwrap(), key))
    }

    async fn count_existing_keys(&self, keys: &[&str]) -> AppResult<u64> {
        let data = self.data.lock().unwrap();
        Ok(keys.iter().filter(|key| Self::live(&data, key)).count() as u64)
    }

    fn instance(&self) -> &dyn Any {
        self
    }
}

/// 进程内互斥锁，记录调用次数
pub struct MemoryLock {
    held: Mutex<HashMap<String, String>>,
    released: Notify,
    wait_timeout: Option<Duration>,
    next_token: AtomicUsize,
    pub lock_calls: AtomicUsize,
    pub unlock_calls: AtomicUsize,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            released: Notify::new(),
            wait_timeout: None,
            next_token: AtomicUsize::new(0),
            lock_calls: AtomicUsize::new(0),
            unlock_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = Some(wait_timeout);
        self
    }

    pub fn lock_calls(&self) -> usize {
        self.lock_calls.load(Ordering::SeqCst)
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().unwrap().contains_key(name)
    }

    fn acquire(&self, name: &str) -> Option<LockHandle> {
        let mut held = self.held.lock().unwrap();
        if held.contains_key(name) {
            return None;
        }
        let token = self.next_token.fetch_add(1, Ordering::SeqCst).to_string();
        held.insert(name.to_string(), token.clone());
        Some(LockHandle::new(name, token))
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn lock(&self, name: &str) -> AppResult<LockHandle> {
        self.lock_calls.fetch_add(1, Ordering::SeqCst);
        let deadline = self.wait_timeout.map(|wait| tokio::time::Instant::now() + wait);
        loop {
            let notified = self.released.notified();
            if let Some(handle) = self.acquire(name) {
                return Ok(handle);
            }
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Err(AppError::lock_timeout(name));
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn try_lock(&self, name: &str) -> AppResult<Option<LockHandle>> {
        Ok(self.acquire(name))
    }

    async fn unlock(&self, handle: LockHandle) -> AppResult<bool> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        let removed = {
            let mut held = self.held.lock().unwrap();
            match held.get(handle.name()) {
                Some(token) if token == handle.token() => held.remove(handle.name()).is_some(),
                _ => false,
            }
        };
        self.released.notify_waiters();
        Ok(removed)
    }
}

/// 精确集合实现的布隆过滤器（没有误判），记录调用次数
pub struct MemoryBloomFilter {
    items: Mutex<HashSet<String>>,
    pub add_calls: AtomicUsize,
    pub contains_calls: AtomicUsize,
}

impl MemoryBloomFilter {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashSet::new()),
            add_calls: AtomicUsize::new(0),
            contains_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_items(items: &[&str]) -> Self {
        let filter = Self::new();
        filter
            .items
            .lock()
            .unwrap()
            .extend(items.iter().map(|item| item.to_string()));
        filter
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn contains_calls(&self) -> usize {
        self.contains_calls.load(Ordering::SeqCst)
    }

    pub fn has(&self, item: &str) -> bool {
        self.items.lock().unwrap().contains(item)
    }
}

#[async_trait]
impl BloomFilter for MemoryBloomFilter {
    async fn add(&self, item: &str) -> AppResult<bool> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().unwrap().insert(item.to_string()))
    }

    async fn contains(&self, item: &str) -> AppResult<bool> {
        self.contains_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.lock().unwrap().contains(item))
    }
}

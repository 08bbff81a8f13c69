//! dcache-core - 防击穿 / 防穿透 / 防雪崩的分布式缓存
//!
//! [`ProtectedCache`] 组合任意 [`Cache`](dcache_ports::Cache) 与
//! [`DistributedLock`](dcache_ports::DistributedLock) 实现 `DistributedCache`。

mod jitter;
mod protected_cache;

pub use jitter::TtlJitter;
pub use protected_cache::{ProtectedCache, ProtectedCacheConfig};

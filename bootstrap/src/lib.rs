//! dcache-bootstrap - 缓存基础设施装配
//!
//! 从配置创建 Redis 连接、锁、布隆过滤器以及带击穿防护的缓存。

mod infrastructure;
mod retry;
mod runtime;

pub use infrastructure::*;
pub use retry::*;
pub use runtime::*;

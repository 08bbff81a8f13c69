//! dcache-adapter-redis - Redis 适配器

mod bloom_filter;
mod cache;
mod connection;
mod distributed_lock;

pub use bloom_filter::*;
pub use cache::*;
pub use connection::*;
pub use distributed_lock::*;

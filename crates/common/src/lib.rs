//! common - 缓存层通用类型和工具

pub mod key;
pub mod ttl;

pub use key::*;
pub use ttl::*;

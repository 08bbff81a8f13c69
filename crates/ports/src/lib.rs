//! ports - 抽象 trait 层
//!
//! 定义缓存层依赖的所有基础设施接口

mod bloom_filter;
mod cache;
mod distributed_cache;
mod function;
mod lock;
mod value;

pub use bloom_filter::*;
pub use cache::*;
pub use distributed_cache::*;
pub use function::*;
pub use lock::*;
pub use value::*;

//! dcache-errors - 统一错误处理
//!
//! 缓存层的所有错误都直接交给调用方，不做内部重试。
//! 调用方需要区分「基础设施故障」和「key 不存在」：前者是错误，后者是 `Ok(None)`。

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储的内容无法解码为请求的类型
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// 值无法编码为存储格式
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Redis / 锁服务 / 布隆过滤器不可用
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// 等待分布式锁超时
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// 调用方提供的 loader 返回错误
    #[error("Cache loader failed: {0}")]
    Loader(#[source] anyhow::Error),

    /// 参数或配置非法（空 key、零 TTL 等），在任何 I/O 之前拒绝
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::Infrastructure(msg.into())
    }

    pub fn lock_timeout(msg: impl Into<String>) -> Self {
        Self::LockTimeout(msg.into())
    }

    pub fn loader(err: impl Into<anyhow::Error>) -> Self {
        Self::Loader(err.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 是否为基础设施类错误（存储或锁服务故障），绝不能当作缓存未命中处理
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure(_) | Self::LockTimeout(_))
    }

    /// 调用方是否可以稍后重试
    pub fn is_retryable(&self) -> bool {
        self.is_infrastructure()
    }

    /// 错误分类标签，用于日志和指标
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deserialization(_) => "deserialization",
            Self::Serialization(_) => "serialization",
            Self::Infrastructure(_) => "infrastructure",
            Self::LockTimeout(_) => "lock_timeout",
            Self::Loader(_) => "loader",
            Self::Configuration(_) => "configuration",
        }
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

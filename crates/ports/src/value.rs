//! 缓存值编解码

use std::ops::Deref;

use dcache_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// 可以存入缓存的值
pub trait CacheValue: Sized + Send + Sync {
    /// 编码为存储字符串；返回 `None` 表示没有有效载荷，不应写入
    fn encode(&self) -> AppResult<Option<String>>;

    /// 从存储字符串解码
    fn decode(raw: String) -> AppResult<Self>;

    /// 是否为「空白」值，配合 `BlankPolicy::Absent` 使用
    fn is_blank(&self) -> bool {
        false
    }

    /// 编码后是否有有效载荷；没有载荷的值在任何策略下都算未找到
    fn has_payload(&self) -> bool {
        true
    }
}

impl CacheValue for String {
    fn encode(&self) -> AppResult<Option<String>> {
        Ok(Some(self.clone()))
    }

    fn decode(raw: String) -> AppResult<Self> {
        Ok(raw)
    }

    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

/// 以 JSON 形式存储的值
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Json<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> CacheValue for Json<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn encode(&self) -> AppResult<Option<String>> {
        let payload = serde_json::to_string(&self.0)
            .map_err(|e| AppError::serialization(format!("JSON encode failed: {}", e)))?;
        // null 不是有效载荷
        if payload == "null" {
            return Ok(None);
        }
        Ok(Some(payload))
    }

    fn decode(raw: String) -> AppResult<Self> {
        serde_json::from_str(&raw)
            .map(Json)
            .map_err(|e| AppError::deserialization(format!("JSON decode failed: {}", e)))
    }

    fn has_payload(&self) -> bool {
        !matches!(serde_json::to_value(&self.0), Ok(serde_json::Value::Null))
    }
}

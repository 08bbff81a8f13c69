//! 缓存 key 工具

use dcache_errors::{AppError, AppResult};

/// key 各段之间的连接符
pub const KEY_SEPARATOR: &str = ":";

/// 拼接缓存 key，任何一段为空白都视为调用错误
///
/// ```
/// let key = dcache_common::build_key(&["user", "42"]).unwrap();
/// assert_eq!(key, "user:42");
/// ```
pub fn build_key<S: AsRef<str>>(parts: &[S]) -> AppResult<String> {
    if parts.is_empty() {
        return Err(AppError::configuration("cache key needs at least one part"));
    }
    if parts.iter().any(|part| part.as_ref().trim().is_empty()) {
        return Err(AppError::configuration(
            "cache key part must not be null or empty",
        ));
    }
    Ok(parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR))
}

/// 校验 key 非空白
pub fn ensure_key(key: &str) -> AppResult<()> {
    if key.trim().is_empty() {
        return Err(AppError::configuration("cache key must not be blank"));
    }
    Ok(())
}

/// 批量校验 key
pub fn ensure_keys<S: AsRef<str>>(keys: &[S]) -> AppResult<()> {
    keys.iter().try_for_each(|key| ensure_key(key.as_ref()))
}

//! 读穿透缓存抽象。
//!
//! 键格式与 TTL 和既有部署保持兼容；写入路径只做删除（write-invalidate），
//! 从不原地更新缓存值。后端不可用时按"软失败"处理：读当作未命中，
//! 写/删只记录告警。

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// 逻辑缓存键。`to_string()` 产出的字符串格式是对外契约，不能改动。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// 单个帖子：`post:<uuid>`
    Post(Uuid),
    /// 全站信息流：`posts:feed`
    PostsFeed,
    /// 帖子下的消息列表：`messages:<uuid>`
    Messages(Uuid),
    /// 用户资料：`user:<uuid>`
    User(Uuid),
    /// 登录会话：`session:<id>`
    Session(String),
    /// 限流计数器：`rate_limit:<identity>`
    RateLimit(String),
}

impl CacheKey {
    /// 按资源易变程度区分的 TTL：消息列表变化最频繁，单帖视图最稳定。
    pub fn ttl(&self) -> Duration {
        match self {
            CacheKey::Post(_) => Duration::from_secs(10 * 60),
            CacheKey::PostsFeed => Duration::from_secs(5 * 60),
            CacheKey::Messages(_) => Duration::from_secs(2 * 60),
            CacheKey::User(_) => Duration::from_secs(30 * 60),
            CacheKey::Session(_) => Duration::from_secs(24 * 60 * 60),
            CacheKey::RateLimit(_) => Duration::from_secs(60),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Post(id) => write!(f, "post:{}", id),
            CacheKey::PostsFeed => write!(f, "posts:feed"),
            CacheKey::Messages(post_id) => write!(f, "messages:{}", post_id),
            CacheKey::User(id) => write!(f, "user:{}", id),
            CacheKey::Session(id) => write!(f, "session:{}", id),
            CacheKey::RateLimit(identity) => write!(f, "rate_limit:{}", identity),
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// 注入式缓存能力。值是已序列化的 JSON 字符串，由调用方负责编解码。
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;
}

/// 缓存读的软失败包装：后端故障或值损坏都当作未命中。
pub async fn lookup_json<T: serde::de::DeserializeOwned>(
    cache: &dyn Cache,
    key: &CacheKey,
) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, %key, "discarding malformed cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(error = %err, %key, "cache read failed, treating as miss");
            None
        }
    }
}

/// 缓存写的软失败包装，TTL 取键类型的默认值。
pub async fn store_json<T: serde::Serialize>(cache: &dyn Cache, key: &CacheKey, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => {
            if let Err(err) = cache.set(key, raw, key.ttl()).await {
                tracing::warn!(error = %err, %key, "cache write failed");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, %key, "cache value serialization failed");
        }
    }
}

/// 缓存失效的软失败包装：删除失败不阻塞写入路径，缓存靠 TTL 自愈。
pub async fn invalidate(cache: &dyn Cache, key: &CacheKey) {
    if let Err(err) = cache.delete(key).await {
        tracing::warn!(error = %err, %key, "cache invalidation failed");
    }
}

/// 进程内缓存实现，供测试和无 Redis 的本地开发使用。
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = key.to_string();
        match entries.get(&key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_formats_are_stable() {
        let id = Uuid::parse_str("3f0e9a6e-8a6f-4f2e-9c1d-2b7a5e4d3c21").unwrap();
        assert_eq!(
            CacheKey::Post(id).to_string(),
            "post:3f0e9a6e-8a6f-4f2e-9c1d-2b7a5e4d3c21"
        );
        assert_eq!(CacheKey::PostsFeed.to_string(), "posts:feed");
        assert_eq!(
            CacheKey::Messages(id).to_string(),
            "messages:3f0e9a6e-8a6f-4f2e-9c1d-2b7a5e4d3c21"
        );
        assert_eq!(
            CacheKey::User(id).to_string(),
            "user:3f0e9a6e-8a6f-4f2e-9c1d-2b7a5e4d3c21"
        );
        assert_eq!(
            CacheKey::Session("abc".to_string()).to_string(),
            "session:abc"
        );
        assert_eq!(
            CacheKey::RateLimit(format!("user:{}", id)).to_string(),
            "rate_limit:user:3f0e9a6e-8a6f-4f2e-9c1d-2b7a5e4d3c21"
        );
    }

    #[test]
    fn ttls_follow_volatility() {
        let id = Uuid::new_v4();
        assert_eq!(CacheKey::Post(id).ttl(), Duration::from_secs(600));
        assert_eq!(CacheKey::PostsFeed.ttl(), Duration::from_secs(300));
        assert_eq!(CacheKey::Messages(id).ttl(), Duration::from_secs(120));
        assert_eq!(CacheKey::User(id).ttl(), Duration::from_secs(1800));
    }

    #[tokio::test]
    async fn memory_cache_round_trip_and_delete() {
        let cache = MemoryCache::new();
        let key = CacheKey::Post(Uuid::new_v4());

        assert!(cache.get(&key).await.unwrap().is_none());

        cache
            .set(&key, "\"value\"".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("\"value\""));

        cache.delete(&key).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        let key = CacheKey::PostsFeed;

        cache
            .set(&key, "[]".to_string(), Duration::from_secs(0))
            .await
            .unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }
}

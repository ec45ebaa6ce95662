//! Redis 适配：读穿透缓存与限流计数器。
//!
//! 两者共用同一个 `ConnectionManager`（自带断线重连），
//! 所有错误原样翻译成应用层的"不可用"错误，降级策略由应用层决定。

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use application::cache::{Cache, CacheError, CacheKey};
use application::rate_limiter::{CounterStoreError, RateCounterStore};

/// 建立 Redis 连接并用 PING 验证可达。
pub async fn create_redis_manager(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    let mut manager = ConnectionManager::new(client).await?;
    redis::cmd("PING").query_async::<()>(&mut manager).await?;
    tracing::info!("redis connection ready");
    Ok(manager)
}

pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key.to_string())
            .await
            .map_err(|err| CacheError::unavailable(err.to_string()))
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key.to_string(), value, ttl.as_secs())
            .await
            .map_err(|err| CacheError::unavailable(err.to_string()))
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.to_string())
            .await
            .map_err(|err| CacheError::unavailable(err.to_string()))
    }
}

pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateCounterStore for RedisCounterStore {
    async fn count(&self, key: &str) -> Result<Option<u32>, CounterStoreError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<u32>>(key)
            .await
            .map_err(|err| CounterStoreError::unavailable(err.to_string()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CounterStoreError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn
            .ttl(key)
            .await
            .map_err(|err| CounterStoreError::unavailable(err.to_string()))?;
        // -2: 键不存在，-1: 无过期时间
        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(ttl as u64)))
        }
    }

    async fn increment_with_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u32, CounterStoreError> {
        let mut conn = self.conn.clone();
        // INCR 与 EXPIRE 必须一起生效，否则计数器可能永不过期
        let (count, _): (u32, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window.as_secs() as i64)
            .query_async(&mut conn)
            .await
            .map_err(|err| CounterStoreError::unavailable(err.to_string()))?;
        Ok(count)
    }
}

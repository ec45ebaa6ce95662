//! 请求准入控制。
//!
//! 两个相互独立、叠加使用的机制：
//! - 全局令牌桶：进程级粗粒度阈值，耗尽时立即拒绝，不产生存储往返；
//! - 按身份固定窗口计数：`rate_limit:<identity>` 键由外部 KV 存储承载，
//!   计数与过期时间作为单个流水线单元原子写入。
//!
//! 失败放行（fail-open）是显式策略：计数存储不可用时请求一律放行，
//! 应用可用性优先于严格限流。放行决定通过 `fail_open` 标志可见、可测。

use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::CacheKey;
use crate::clock::Clock;

/// 固定限流窗口。
pub const WINDOW: Duration = Duration::from_secs(60);

/// 受限操作类型，各自有独立的每分钟上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationClass {
    Login,
    PostCreation,
    MessageCreation,
}

impl OperationClass {
    pub fn ceiling(&self) -> u32 {
        match self {
            OperationClass::Login => 5,
            OperationClass::PostCreation => 10,
            OperationClass::MessageCreation => 60,
        }
    }
}

/// 限流身份：已认证请求按用户，匿名请求按客户端地址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateIdentity {
    User(Uuid),
    Ip(IpAddr),
}

impl fmt::Display for RateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateIdentity::User(id) => write!(f, "user:{}", id),
            RateIdentity::Ip(addr) => write!(f, "ip:{}", addr),
        }
    }
}

/// 准入判定结果，连同响应元数据一起返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub admitted: bool,
    /// 计数存储不可用导致的放行
    pub fail_open: bool,
    pub limit: u32,
    pub remaining: u32,
    /// 窗口重置时刻（Unix 秒对外暴露）
    pub reset_at: domain::Timestamp,
}

#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

impl CounterStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// 窗口计数器的存储后端。
#[async_trait]
pub trait RateCounterStore: Send + Sync {
    /// 当前计数，键不存在返回 None。
    async fn count(&self, key: &str) -> Result<Option<u32>, CounterStoreError>;
    /// 键的剩余存活时间，键不存在或未设置过期返回 None。
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CounterStoreError>;
    /// 计数 +1 并（重新）设置过期，两者必须是一个原子单元，返回新计数。
    async fn increment_with_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u32, CounterStoreError>;
}

/// 按身份的固定窗口限流器。
pub struct SlidingWindowLimiter {
    store: Arc<dyn RateCounterStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn RateCounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_window(store, clock, WINDOW)
    }

    pub fn with_window(
        store: Arc<dyn RateCounterStore>,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            window,
        }
    }

    /// 判定一次请求。存储故障走 fail-open，本方法本身不会失败。
    pub async fn check(&self, identity: &RateIdentity, class: OperationClass) -> RateLimitDecision {
        let key = CacheKey::RateLimit(identity.to_string()).to_string();
        let limit = class.ceiling();
        let now = self.clock.now();

        let current = match self.store.count(&key).await {
            Ok(count) => count.unwrap_or(0),
            Err(err) => {
                tracing::warn!(error = %err, %identity, "rate limit store read failed, failing open");
                return self.fail_open(limit, now);
            }
        };

        if current >= limit {
            let ttl = match self.store.ttl(&key).await {
                Ok(ttl) => ttl.unwrap_or(self.window),
                Err(_) => self.window,
            };
            return RateLimitDecision {
                admitted: false,
                fail_open: false,
                limit,
                remaining: 0,
                reset_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            };
        }

        match self.store.increment_with_window(&key, self.window).await {
            Ok(new_count) => RateLimitDecision {
                admitted: true,
                fail_open: false,
                limit,
                remaining: limit.saturating_sub(new_count),
                reset_at: now + chrono::Duration::from_std(self.window).unwrap_or_default(),
            },
            Err(err) => {
                tracing::warn!(error = %err, %identity, "rate limit store increment failed, failing open");
                self.fail_open(limit, now)
            }
        }
    }

    fn fail_open(&self, limit: u32, now: domain::Timestamp) -> RateLimitDecision {
        RateLimitDecision {
            admitted: true,
            fail_open: true,
            limit,
            remaining: limit,
            reset_at: now + chrono::Duration::from_std(self.window).unwrap_or_default(),
        }
    }
}

/// 进程级全局令牌桶，按固定速率持续补充。
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// 非阻塞取一个令牌，桶空时立即返回 false。
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// 进程内计数存储，供测试和无 Redis 的本地开发使用。
#[derive(Default)]
pub struct MemoryCounterStore {
    entries: Mutex<std::collections::HashMap<String, (u32, Instant)>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCounterStore for MemoryCounterStore {
    async fn count(&self, key: &str) -> Result<Option<u32>, CounterStoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some((count, expires_at)) if Instant::now() < *expires_at => Ok(Some(*count)),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CounterStoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .get(key)
            .and_then(|(_, expires_at)| expires_at.checked_duration_since(Instant::now())))
    }

    async fn increment_with_window(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<u32, CounterStoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let entry = entries
            .entry(key.to_string())
            .and_modify(|(count, expires_at)| {
                if now >= *expires_at {
                    *count = 0;
                }
                *count += 1;
                *expires_at = now + window;
            })
            .or_insert((1, now + window));
        Ok(entry.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    struct FailingStore;

    #[async_trait]
    impl RateCounterStore for FailingStore {
        async fn count(&self, _key: &str) -> Result<Option<u32>, CounterStoreError> {
            Err(CounterStoreError::unavailable("connection refused"))
        }

        async fn ttl(&self, _key: &str) -> Result<Option<Duration>, CounterStoreError> {
            Err(CounterStoreError::unavailable("connection refused"))
        }

        async fn increment_with_window(
            &self,
            _key: &str,
            _window: Duration,
        ) -> Result<u32, CounterStoreError> {
            Err(CounterStoreError::unavailable("connection refused"))
        }
    }

    fn limiter_with(store: Arc<dyn RateCounterStore>) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(store, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn sixth_request_in_window_is_rejected() {
        let limiter = limiter_with(Arc::new(MemoryCounterStore::new()));
        let identity = RateIdentity::User(Uuid::new_v4());
        let start = chrono::Utc::now();

        for expected_remaining in (0..5).rev() {
            let decision = limiter.check(&identity, OperationClass::Login).await;
            assert!(decision.admitted);
            assert!(!decision.fail_open);
            assert_eq!(decision.limit, 5);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check(&identity, OperationClass::Login).await;
        assert!(!decision.admitted);
        assert_eq!(decision.remaining, 0);
        // 重置时刻不超过首个请求后 60 秒
        assert!(decision.reset_at <= start + chrono::Duration::seconds(61));
    }

    #[tokio::test]
    async fn identities_are_isolated() {
        let limiter = limiter_with(Arc::new(MemoryCounterStore::new()));
        let first = RateIdentity::User(Uuid::new_v4());
        let second = RateIdentity::Ip("10.0.0.1".parse().unwrap());

        for _ in 0..5 {
            assert!(limiter.check(&first, OperationClass::Login).await.admitted);
        }
        assert!(!limiter.check(&first, OperationClass::Login).await.admitted);
        assert!(limiter.check(&second, OperationClass::Login).await.admitted);
    }

    #[tokio::test]
    async fn window_expiry_readmits() {
        let limiter = SlidingWindowLimiter::with_window(
            Arc::new(MemoryCounterStore::new()),
            Arc::new(SystemClock),
            Duration::from_millis(40),
        );
        let identity = RateIdentity::User(Uuid::new_v4());

        for _ in 0..5 {
            assert!(limiter.check(&identity, OperationClass::Login).await.admitted);
        }
        assert!(!limiter.check(&identity, OperationClass::Login).await.admitted);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.check(&identity, OperationClass::Login).await.admitted);
    }

    #[tokio::test]
    async fn store_outage_fails_open() {
        let limiter = limiter_with(Arc::new(FailingStore));
        let identity = RateIdentity::Ip("10.0.0.2".parse().unwrap());

        for _ in 0..20 {
            let decision = limiter.check(&identity, OperationClass::Login).await;
            assert!(decision.admitted);
            assert!(decision.fail_open);
        }
    }

    #[test]
    fn token_bucket_drains_and_rejects() {
        let bucket = TokenBucket::new(3, 0.001);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test]
    async fn token_bucket_refills_over_time() {
        let bucket = TokenBucket::new(1, 100.0);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(bucket.try_acquire());
    }

    #[test]
    fn ceilings_match_operation_classes() {
        assert_eq!(OperationClass::Login.ceiling(), 5);
        assert_eq!(OperationClass::PostCreation.ceiling(), 10);
        assert_eq!(OperationClass::MessageCreation.ceiling(), 60);
    }
}

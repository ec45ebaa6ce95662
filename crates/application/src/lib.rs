//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务，处理输入校验、
//! 持久化 → 缓存失效 → 实时广播 的写入顺序，
//! 以及对外部适配器（缓存、限流计数器、密码哈希）的抽象。

pub mod cache;
pub mod clock;
pub mod dto;
pub mod error;
pub mod events;
pub mod hub;
pub mod password;
pub mod rate_limiter;
pub mod repository;
pub mod services;

pub use cache::{Cache, CacheError, CacheKey, MemoryCache};
pub use clock::{Clock, SystemClock};
pub use dto::{MessageDto, PostDto, UserDto};
pub use error::ApplicationError;
pub use events::{EventPublisher, FanoutEvent, PublishError};
pub use hub::{ConnectionId, Hub};
pub use password::{PasswordHasher, PasswordHasherError};
pub use rate_limiter::{
    CounterStoreError, MemoryCounterStore, OperationClass, RateCounterStore, RateIdentity,
    RateLimitDecision, SlidingWindowLimiter, TokenBucket,
};
pub use repository::{MessageRepository, PostRepository, UserRepository};
pub use services::{
    MessageService, MessageServiceDependencies, PostService, PostServiceDependencies, UserService,
    UserServiceDependencies,
};

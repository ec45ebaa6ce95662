//! 基础设施层：PostgreSQL 仓储、Redis 缓存与限流计数器、bcrypt 密码哈希。
//!
//! 本层只做适配，不含业务规则；所有实现都落在应用层定义的 trait 上。

pub mod password;
pub mod redis;
pub mod repository;

pub use password::BcryptPasswordHasher;
pub use redis::{create_redis_manager, RedisCache, RedisCounterStore};
pub use repository::{
    create_pg_pool, PgMessageRepository, PgPostRepository, PgUserRepository,
};

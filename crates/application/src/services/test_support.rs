//! 服务层测试共用的内存假件。
//!
//! 写路径顺序断言通过共享的操作日志完成：仓储、缓存、广播器
//! 在各自动作发生时向日志追加条目。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    Message, Post, PostId, RepositoryError, User, UserEmail, UserId, Username,
};

use crate::{
    cache::{Cache, CacheError, CacheKey, MemoryCache},
    events::{EventPublisher, FanoutEvent, PublishError},
    repository::{MessageRepository, PostRepository, UserRepository},
};

pub type OpLog = Arc<Mutex<Vec<String>>>;

pub fn new_op_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(log: &Option<OpLog>, entry: impl Into<String>) {
    if let Some(log) = log {
        log.lock().unwrap().push(entry.into());
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(RepositoryError::Conflict);
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_username(
        &self,
        username: Username,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: Mutex<Vec<Post>>,
    log: Option<OpLog>,
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: OpLog) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            log: Some(log),
        }
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        record(&self.log, "persist");
        self.posts.lock().unwrap().push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        Ok(self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn get_feed(&self) -> Result<Vec<Post>, RepositoryError> {
        let mut posts = self.posts.lock().unwrap().clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>, RepositoryError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    log: Option<OpLog>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: OpLog) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            log: Some(log),
        }
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
        record(&self.log, "persist");
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Message>, RepositoryError> {
        let mut messages: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.post_id == post_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}

/// 持久化失败的消息仓储，验证失败时既不失效缓存也不广播。
pub struct FailingMessageRepository;

#[async_trait]
impl MessageRepository for FailingMessageRepository {
    async fn create(&self, _message: Message) -> Result<Message, RepositoryError> {
        Err(RepositoryError::storage("database unavailable"))
    }

    async fn list_by_post(&self, _post_id: PostId) -> Result<Vec<Message>, RepositoryError> {
        Err(RepositoryError::storage("database unavailable"))
    }
}

/// 记录删除操作的缓存包装，底层是 MemoryCache。
pub struct LoggingCache {
    inner: MemoryCache,
    log: OpLog,
}

impl LoggingCache {
    pub fn new(log: OpLog) -> Self {
        Self {
            inner: MemoryCache::new(),
            log,
        }
    }
}

#[async_trait]
impl Cache for LoggingCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        record(&Some(self.log.clone()), format!("invalidate:{}", key));
        self.inner.delete(key).await
    }
}

/// 全部操作都失败的缓存，模拟后端故障。
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<String>, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn set(&self, _key: &CacheKey, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }
}

/// 记录发布事件的广播器假件。
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<FanoutEvent>>,
    log: Option<OpLog>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: OpLog) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            log: Some(log),
        }
    }

    pub fn published(&self) -> Vec<FanoutEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: FanoutEvent) -> Result<(), PublishError> {
        record(&self.log, "publish");
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

//! PostgreSQL 仓储实现。
//!
//! 行模型（`*Row`）与领域实体分离：行模型按表结构派生 `FromRow`，
//! 转换到实体时重新经过值对象校验，库里的脏数据在这里暴露为存储错误。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use application::repository::{MessageRepository, PostRepository, UserRepository};
use domain::{
    Message, MessageContent, MessageId, PasswordHash, Post, PostId, RepositoryError, User,
    UserEmail, UserId, Username,
};

/// 建立数据库连接池。
pub async fn create_pg_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    tracing::info!(max_connections, "database pool ready");
    Ok(pool)
}

/// PostgreSQL 唯一约束冲突错误码
const UNIQUE_VIOLATION: &str = "23505";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            RepositoryError::Conflict
        }
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn corrupt_row(table: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::storage(format!("invalid {} row: {}", table, err))
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            username: Username::parse(row.username).map_err(|e| corrupt_row("users", e))?,
            email: UserEmail::parse(row.email).map_err(|e| corrupt_row("users", e))?,
            password: PasswordHash::new(row.password_hash)
                .map_err(|e| corrupt_row("users", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgUserRepository {
    pool: Arc<PgPool>,
}

impl PgUserRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(row)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_username(&self, username: Username) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE username = $1",
        )
        .bind(username.as_str())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        row.map(User::try_from).transpose()
    }
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    image_url: String,
    caption: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = RepositoryError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Post::new(
            PostId(row.id),
            UserId(row.user_id),
            row.image_url,
            row.caption,
            row.created_at,
        )
        .map(|mut post| {
            post.updated_at = row.updated_at;
            post
        })
        .map_err(|e| corrupt_row("posts", e))
    }
}

pub struct PgPostRepository {
    pool: Arc<PgPool>,
}

impl PgPostRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, user_id, image_url, caption, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, image_url, caption, created_at, updated_at
            "#,
        )
        .bind(post.id.0)
        .bind(post.user_id.0)
        .bind(&post.image_url)
        .bind(&post.caption)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        Post::try_from(row)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError> {
        let row = sqlx::query_as::<_, PostRow>(
            "SELECT id, user_id, image_url, caption, created_at, updated_at FROM posts WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        row.map(Post::try_from).transpose()
    }

    async fn get_feed(&self) -> Result<Vec<Post>, RepositoryError> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT id, user_id, image_url, caption, created_at, updated_at FROM posts ORDER BY created_at DESC",
        )
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(Post::try_from).collect()
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>, RepositoryError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, image_url, caption, created_at, updated_at
            FROM posts WHERE user_id = $1 ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(Post::try_from).collect()
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    post_id: Uuid,
    sender_id: Uuid,
    message: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = RepositoryError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: MessageId(row.id),
            post_id: PostId(row.post_id),
            sender_id: UserId(row.sender_id),
            content: MessageContent::parse(row.message)
                .map_err(|e| corrupt_row("messages", e))?,
            created_at: row.created_at,
        })
    }
}

pub struct PgMessageRepository {
    pool: Arc<PgPool>,
}

impl PgMessageRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, post_id, sender_id, message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, post_id, sender_id, message, created_at
            "#,
        )
        .bind(message.id.0)
        .bind(message.post_id.0)
        .bind(message.sender_id.0)
        .bind(message.content.as_str())
        .bind(message.created_at)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(row)
    }

    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, post_id, sender_id, message, created_at
            FROM messages WHERE post_id = $1 ORDER BY created_at ASC
            "#,
        )
        .bind(post_id.0)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter().map(Message::try_from).collect()
    }
}

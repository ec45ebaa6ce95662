use async_trait::async_trait;
use domain::{Message, Post, PostId, RepositoryError, User, UserEmail, UserId, Username};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: Username)
        -> Result<Option<User>, RepositoryError>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError>;
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, RepositoryError>;
    // 全站信息流，按创建时间倒序
    async fn get_feed(&self) -> Result<Vec<Post>, RepositoryError>;
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError>;
    // 帖子下的消息，按创建时间正序
    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Message>, RepositoryError>;
}

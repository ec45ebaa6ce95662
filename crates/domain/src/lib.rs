//! 社交应用核心领域模型
//!
//! 包含用户、帖子、帖子下的消息等核心实体，以及相关的校验规则。

pub mod errors;
pub mod message;
pub mod post;
pub mod user;
pub mod value_objects;

pub use errors::{DomainError, RepositoryError};
pub use message::Message;
pub use post::Post;
pub use user::User;
pub use value_objects::{
    MessageContent, MessageId, PasswordHash, PostId, Timestamp, UserEmail, UserId, Username,
};

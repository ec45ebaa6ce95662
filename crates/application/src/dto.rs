use domain::{Message, Post, Timestamp, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
            email: user.email.as_str().to_owned(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub caption: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&Post> for PostDto {
    fn from(post: &Post) -> Self {
        Self {
            id: Uuid::from(post.id),
            user_id: Uuid::from(post.user_id),
            image_url: post.image_url.clone(),
            caption: post.caption.clone(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub post_id: Uuid,
    pub sender_id: Uuid,
    pub message: String,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: Uuid::from(message.id),
            post_id: Uuid::from(message.post_id),
            sender_id: Uuid::from(message.sender_id),
            message: message.content.as_str().to_owned(),
            created_at: message.created_at,
        }
    }
}

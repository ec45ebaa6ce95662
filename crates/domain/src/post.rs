use crate::errors::DomainError;
use crate::value_objects::{PostId, Timestamp, UserId};

/// 图片帖子。`image_url` 指向对象存储里已上传的图片。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Post {
    pub id: PostId,
    pub user_id: UserId,
    pub image_url: String,
    pub caption: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Post {
    pub fn new(
        id: PostId,
        user_id: UserId,
        image_url: String,
        caption: String,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        if image_url.trim().is_empty() {
            return Err(DomainError::invalid_argument("image_url", "cannot be empty"));
        }
        Ok(Self {
            id,
            user_id,
            image_url,
            caption,
            created_at: now,
            updated_at: now,
        })
    }
}

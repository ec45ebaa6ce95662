use crate::value_objects::{MessageContent, MessageId, PostId, Timestamp, UserId};

/// 帖子下的一条消息（评论流），通过实时通道推送给在线客户端。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub post_id: PostId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        post_id: PostId,
        sender_id: UserId,
        content: MessageContent,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            post_id,
            sender_id,
            content,
            created_at: now,
        }
    }
}

//! 实时推送的出站事件。
//!
//! 线缆格式：`{"type": "new_message", "post_id": "<uuid>", "content": {...}}`，
//! JSON 文本帧。目前只定义了 `new_message` 一种事件。

use async_trait::async_trait;
use domain::PostId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dto::MessageDto;

/// 推送给所有在线连接的事件载荷。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub content: serde_json::Value,
}

impl FanoutEvent {
    pub fn new_message(post_id: PostId, message: &MessageDto) -> Result<Self, PublishError> {
        Ok(Self {
            event_type: "new_message".to_string(),
            post_id: post_id.to_string(),
            user_id: None,
            content: serde_json::to_value(message)
                .map_err(|err| PublishError::Serialization(err.to_string()))?,
        })
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event serialization failed: {0}")]
    Serialization(String),
}

/// 写路径完成持久化和缓存失效后调用的广播出口。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: FanoutEvent) -> Result<(), PublishError>;
}

//! 消息用例服务。
//!
//! 写路径是整个核心的跨组件不变式所在：
//! 持久化 → 使帖子的消息列表缓存失效 → 向 Hub 广播 `new_message` → 返回成功。
//! 持久化失败则既不失效也不广播；失效/广播失败不回滚已落库的写入。

use std::sync::Arc;

use domain::{Message, MessageContent, MessageId, PostId, UserId};
use uuid::Uuid;

use crate::{
    cache::{self, Cache, CacheKey},
    clock::Clock,
    dto::MessageDto,
    error::ApplicationError,
    events::{EventPublisher, FanoutEvent},
    repository::MessageRepository,
};

#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub message: String,
}

pub struct MessageServiceDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub cache: Arc<dyn Cache>,
    pub publisher: Arc<dyn EventPublisher>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn create_message(
        &self,
        post_id: Uuid,
        sender_id: Uuid,
        request: CreateMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let content = MessageContent::parse(request.message)?;
        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            PostId::from(post_id),
            UserId::from(sender_id),
            content,
            self.deps.clock.now(),
        );

        let stored = self.deps.message_repository.create(message).await?;
        let dto = MessageDto::from(&stored);

        // 失效必须先于广播，两者都在持久化成功之后
        cache::invalidate(self.deps.cache.as_ref(), &CacheKey::Messages(post_id)).await;

        match FanoutEvent::new_message(stored.post_id, &dto) {
            Ok(event) => {
                if let Err(err) = self.deps.publisher.publish(event).await {
                    tracing::warn!(error = %err, %post_id, "failed to publish new_message event");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, %post_id, "failed to build new_message event");
            }
        }

        Ok(dto)
    }

    /// 帖子下的消息列表，读穿透缓存，空列表不缓存。
    pub async fn get_messages(&self, post_id: Uuid) -> Result<Vec<MessageDto>, ApplicationError> {
        let key = CacheKey::Messages(post_id);
        if let Some(cached) =
            cache::lookup_json::<Vec<MessageDto>>(self.deps.cache.as_ref(), &key).await
        {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let messages = self
            .deps
            .message_repository
            .list_by_post(PostId::from(post_id))
            .await?;
        let dtos: Vec<MessageDto> = messages.iter().map(MessageDto::from).collect();

        if !dtos.is_empty() {
            cache::store_json(self.deps.cache.as_ref(), &key, &dtos).await;
        }

        Ok(dtos)
    }
}

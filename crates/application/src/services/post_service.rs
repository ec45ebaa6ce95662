//! 帖子用例服务。
//!
//! 读路径走读穿透缓存；写路径遵循 持久化 → 缓存失效 的顺序，
//! 失效发生在向调用方返回成功之前。

use std::sync::Arc;

use domain::{DomainError, Post, PostId, UserId};
use uuid::Uuid;

use crate::{
    cache::{self, Cache, CacheKey},
    clock::Clock,
    dto::PostDto,
    error::ApplicationError,
    repository::PostRepository,
};

#[derive(Debug, Clone)]
pub struct CreatePostRequest {
    pub image_url: String,
    pub caption: String,
}

pub struct PostServiceDependencies {
    pub post_repository: Arc<dyn PostRepository>,
    pub cache: Arc<dyn Cache>,
    pub clock: Arc<dyn Clock>,
}

pub struct PostService {
    deps: PostServiceDependencies,
}

impl PostService {
    pub fn new(deps: PostServiceDependencies) -> Self {
        Self { deps }
    }

    /// 发布帖子：持久化成功后使全站信息流缓存失效，再返回。
    pub async fn create_post(
        &self,
        user_id: Uuid,
        request: CreatePostRequest,
    ) -> Result<PostDto, ApplicationError> {
        let now = self.deps.clock.now();
        let post = Post::new(
            PostId::from(Uuid::new_v4()),
            UserId::from(user_id),
            request.image_url,
            request.caption,
            now,
        )?;

        let stored = self.deps.post_repository.create(post).await?;

        cache::invalidate(self.deps.cache.as_ref(), &CacheKey::PostsFeed).await;

        Ok(PostDto::from(&stored))
    }

    pub async fn get_post(&self, id: Uuid) -> Result<PostDto, ApplicationError> {
        let key = CacheKey::Post(id);
        if let Some(dto) = cache::lookup_json::<PostDto>(self.deps.cache.as_ref(), &key).await {
            return Ok(dto);
        }

        let post = self
            .deps
            .post_repository
            .find_by_id(PostId::from(id))
            .await?
            .ok_or(DomainError::PostNotFound)?;

        let dto = PostDto::from(&post);
        cache::store_json(self.deps.cache.as_ref(), &key, &dto).await;
        Ok(dto)
    }

    /// 全站信息流。空结果不写缓存，保证首个新帖不用等 TTL 过期就可见。
    pub async fn get_feed(&self) -> Result<Vec<PostDto>, ApplicationError> {
        let key = CacheKey::PostsFeed;
        if let Some(cached) =
            cache::lookup_json::<Vec<PostDto>>(self.deps.cache.as_ref(), &key).await
        {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let posts = self.deps.post_repository.get_feed().await?;
        let dtos: Vec<PostDto> = posts.iter().map(PostDto::from).collect();

        if !dtos.is_empty() {
            cache::store_json(self.deps.cache.as_ref(), &key, &dtos).await;
        }

        Ok(dtos)
    }

    pub async fn get_user_posts(&self, user_id: Uuid) -> Result<Vec<PostDto>, ApplicationError> {
        let posts = self
            .deps
            .post_repository
            .list_by_user(UserId::from(user_id))
            .await?;
        Ok(posts.iter().map(PostDto::from).collect())
    }
}

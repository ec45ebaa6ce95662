//! 接入层共享状态。

use std::sync::Arc;

use application::{Hub, MessageService, PostService, SlidingWindowLimiter, TokenBucket, UserService};

use crate::auth::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub message_service: Arc<MessageService>,
    pub hub: Arc<Hub>,
    pub jwt_service: JwtService,
    pub token_bucket: Arc<TokenBucket>,
    pub rate_limiter: Arc<SlidingWindowLimiter>,
}

//! 限流中间件。
//!
//! 两层独立叠加：全局令牌桶挂在整个路由器上，按身份的窗口限流
//! 只挂在登录、发帖、发消息三类路由上。身份优先取认证用户，
//! 匿名请求退回客户端地址。
//!
//! 计数存储不可用时按既定策略放行（fail-open），放行响应不带限流响应头。

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use application::{OperationClass, RateIdentity, RateLimitDecision};

use crate::state::AppState;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// 进程级令牌桶，所有路由共享。桶空时立即 429，不产生任何存储往返。
pub async fn global_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.token_bucket.try_acquire() {
        tracing::warn!("global token bucket exhausted");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "Rate limit exceeded",
                "retry_after": "1s",
            })),
        )
            .into_response();
    }
    next.run(request).await
}

/// 按身份的窗口限流，通过 `route_layer` 挂到单个受限路由上。
pub async fn identity_rate_limit(
    State((state, class)): State<(AppState, OperationClass)>,
    request: Request,
    next: Next,
) -> Response {
    let identity = resolve_identity(&state, &request);
    let decision = state.rate_limiter.check(&identity, class).await;

    if !decision.admitted {
        let retry_after = (decision.reset_at - chrono::Utc::now())
            .num_seconds()
            .max(0);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "Rate limit exceeded",
                "retry_after": format!("{}s", retry_after),
            })),
        )
            .into_response();
        apply_headers(response.headers_mut(), &decision);
        return response;
    }

    let fail_open = decision.fail_open;
    let mut response = next.run(request).await;
    // 放行头只在真实判定时附带，fail-open 的响应保持干净
    if !fail_open {
        apply_headers(response.headers_mut(), &decision);
    }
    response
}

fn resolve_identity(state: &AppState, request: &Request) -> RateIdentity {
    if let Ok(user_id) = state.jwt_service.extract_user_from_headers(request.headers()) {
        return RateIdentity::User(user_id);
    }
    let addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    RateIdentity::Ip(addr)
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT_HEADER, number_header(u64::from(decision.limit)));
    headers.insert(REMAINING_HEADER, number_header(u64::from(decision.remaining)));
    headers.insert(
        RESET_HEADER,
        number_header(decision.reset_at.timestamp().max(0) as u64),
    );
}

fn number_header(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}

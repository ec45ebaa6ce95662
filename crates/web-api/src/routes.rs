use axum::{
    extract::{Path, State},
    handler::Handler,
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use application::services::message_service::CreateMessageRequest;
use application::services::post_service::CreatePostRequest;
use application::services::user_service::{AuthenticateUserRequest, RegisterUserRequest};
use application::{OperationClass, UserDto};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::LoginResponse;
use crate::ratelimit::{global_rate_limit, identity_rate_limit};
use crate::ws::websocket_upgrade;
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreatePostPayload {
    image_url: String,
    #[serde(default)]
    caption: String,
}

#[derive(Debug, Deserialize)]
struct CreateMessagePayload {
    message: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), global_rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    let login_limit = middleware::from_fn_with_state(
        (state.clone(), OperationClass::Login),
        identity_rate_limit,
    );
    let post_limit = middleware::from_fn_with_state(
        (state.clone(), OperationClass::PostCreation),
        identity_rate_limit,
    );
    let message_limit = middleware::from_fn_with_state(
        (state, OperationClass::MessageCreation),
        identity_rate_limit,
    );

    Router::new()
        .route("/users/register", post(register_user))
        .route("/users/login", post(login_user.layer(login_limit)))
        .route("/users/profile", get(get_profile))
        .route("/users/posts", get(get_own_posts))
        .route("/posts", get(get_feed).post(create_post.layer(post_limit)))
        .route("/posts/{post_id}", get(get_post))
        .route(
            "/posts/{post_id}/messages",
            get(get_messages).post(create_message.layer(message_limit)),
        )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let dto = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(user.id)?;
    Ok(Json(LoginResponse { token, user }))
}

async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state.user_service.get_profile(user_id).await?;
    Ok(Json(dto))
}

async fn get_own_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let posts = state.post_service.get_user_posts(user_id).await?;
    Ok(Json(json!({ "posts": posts })))
}

async fn get_feed(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let posts = state.post_service.get_feed().await?;
    Ok(Json(json!({ "posts": posts })))
}

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state
        .post_service
        .create_post(
            user_id,
            CreatePostRequest {
                image_url: payload.image_url,
                caption: payload.caption,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "post": dto }))))
}

async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let post = state.post_service.get_post(post_id).await?;
    Ok(Json(json!({ "post": post })))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let messages = state.message_service.get_messages(post_id).await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn create_message(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CreateMessagePayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let sender_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let dto = state
        .message_service
        .create_message(
            post_id,
            sender_id,
            CreateMessageRequest {
                message: payload.message,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Message created successfully",
            "data": dto,
        })),
    ))
}

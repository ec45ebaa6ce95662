//! HTTP/WebSocket 接入层。
//!
//! 路由、JWT 认证、限流中间件和实时会话都在这一层；
//! 业务规则全部委托给应用层服务。

pub mod auth;
pub mod error;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod ws;

pub use auth::{JwtService, LoginResponse};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;

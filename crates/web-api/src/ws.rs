//! 实时会话。
//!
//! 升级前用 `?token=` 完成认证，失败直接 401，不建立连接。
//! 升级后会话只向 Hub 注册一次；入站帧一律忽略（客户端不通过
//! WebSocket 发消息），读侧结束即注销。出站写循环排空 Hub 队列，
//! 队列被 Hub 关闭时补发 Close 帧后结束。

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use domain::UserId;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .ok_or_else(|| ApiError::unauthorized("missing token query parameter"))?;
    let claims = state.jwt_service.verify_token(&token)?;

    Ok(ws.on_upgrade(move |socket| run_session(socket, state, UserId(claims.user_id))))
}

async fn run_session(socket: WebSocket, state: AppState, user_id: UserId) {
    let (connection_id, mut outbound) = state.hub.register(user_id);
    let (mut ws_tx, mut ws_rx) = socket.split();

    // 写循环：排空出站队列。队列只会被 Hub 关闭（注销或慢消费者淘汰），
    // 收到 None 后补发 Close 帧告知客户端。
    let mut write_task = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if ws_tx.send(WsMessage::Text(payload.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_tx.send(WsMessage::Close(None)).await;
    });

    // 读循环：忽略客户端发来的所有数据帧，只等关闭或出错
    let read_loop = async {
        while let Some(Ok(frame)) = ws_rx.next().await {
            if let WsMessage::Close(_) = frame {
                break;
            }
        }
    };

    tokio::select! {
        _ = &mut write_task => {}
        _ = read_loop => {}
    }

    // 注销后队列关闭，仍在运行的写循环会自行收尾
    state.hub.unregister(connection_id);
}

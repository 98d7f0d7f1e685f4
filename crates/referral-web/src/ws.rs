//! WebSocket通知通道
//!
//! 连接建立后加入调用方的通知房间，把房间里的信封转发成文本帧。
//! 连接断开时离开房间；没有离线缓冲。

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use referral_core::ReferralError;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket握手参数
///
/// 浏览器的WebSocket API无法携带自定义头，身份放在查询参数里。
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Uuid,
}

/// WebSocket升级处理器
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    upgrade: WebSocketUpgrade,
) -> ApiResult<impl IntoResponse> {
    // 只有已注册的用户可以加入房间
    let user = state
        .store
        .find_user(params.user_id)
        .await
        .ok_or_else(|| ApiError(ReferralError::NotFound("User not found".to_string())))?;

    Ok(upgrade.on_upgrade(move |socket| handle_socket(state, socket, user.id)))
}

async fn handle_socket(state: AppState, socket: WebSocket, user_id: Uuid) {
    let (connection_id, mut envelopes) = state.hub.join(user_id).await;
    info!("WebSocket connection {} opened for user {}", connection_id, user_id);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            envelope = envelopes.recv() => {
                let Some(envelope) = envelope else { break };
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode envelope: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    debug!("WebSocket send failed for user {}", user_id);
                    break;
                }
            }
            message = stream.next() => {
                match message {
                    // 客户端只收不发，Ping/Pong由axum处理，其余忽略
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.leave(user_id, connection_id).await;
    info!("WebSocket connection {} closed for user {}", connection_id, user_id);
}

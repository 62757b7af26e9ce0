pub mod admin;
pub mod contest;
pub mod handlers;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, Outbound};

const MAX_USER_ID_CHARS: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub code: Option<String>,
    pub user_id: Option<String>,
}

/// Use the client's identifier if it sent a usable one, otherwise make one up
pub fn resolve_user_id(requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.chars().take(MAX_USER_ID_CHARS).collect())
        .unwrap_or_else(|| {
            petname::petname(2, "-").unwrap_or_else(|| ulid::Ulid::new().to_string())
        })
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: code={:?}, user_id={:?}",
        params.code,
        params.user_id
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

async fn send_close(sender: &mut SplitSink<WebSocket, Message>, code: u16, reason: String) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = sender.send(Message::Close(Some(frame))).await;
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let user_id = resolve_user_id(params.user_id.as_deref());
    let code = params.code.unwrap_or_default();

    let conn = match state.join_with_code(&code, &user_id, tx).await {
        Ok(joined) => joined.connection,
        Err(e) => {
            tracing::warn!(code = %code, user_id = %user_id, reason = %e, "Join refused");
            send_message(&mut sender, &ServerMessage::error(e.code(), e.to_string())).await;
            send_close(&mut sender, e.close_code(), e.to_string()).await;
            return;
        }
    };

    // Outbound traffic from the group and inbound commands share one loop
    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(Outbound::Message(msg)) => {
                        if !send_message(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Some(Outbound::Close { code, reason }) => {
                        send_close(&mut sender, code, reason).await;
                        break;
                    }
                    None => break,
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text.as_str());

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if let Some(response) =
                                    handlers::handle_message(client_msg, &conn, &state).await
                                {
                                    if !send_message(&mut sender, &response).await {
                                        tracing::error!("Failed to send response");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    user_id = %conn.user_id,
                                    "Ignoring malformed client message: {}",
                                    e
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.leave(&conn).await;
    tracing::info!(
        group_id = %conn.group_id,
        user_id = %conn.user_id,
        "WebSocket connection closed"
    );
}

//! Admin command handlers: promote, kick, ban

use crate::error::AdminError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, Connection};
use crate::types::UserId;
use std::sync::Arc;

fn admin_error(conn: &Connection, command: &str, err: AdminError) -> Option<ServerMessage> {
    tracing::info!(
        group_id = %conn.group_id,
        user_id = %conn.user_id,
        command,
        reason = %err,
        "Admin command refused"
    );
    Some(ServerMessage::error(err.code(), err.to_string()))
}

pub async fn handle_promote(
    state: &Arc<AppState>,
    conn: &Connection,
    target: UserId,
) -> Option<ServerMessage> {
    match state.promote(conn, &target).await {
        Ok(()) => None,
        Err(e) => admin_error(conn, "promote_admin", e),
    }
}

pub async fn handle_kick(
    state: &Arc<AppState>,
    conn: &Connection,
    target: UserId,
) -> Option<ServerMessage> {
    match state.kick(conn, &target).await {
        Ok(()) => None,
        Err(e) => admin_error(conn, "kick", e),
    }
}

pub async fn handle_ban(
    state: &Arc<AppState>,
    conn: &Connection,
    target: UserId,
) -> Option<ServerMessage> {
    match state.ban(conn, &target).await {
        Ok(()) => None,
        Err(e) => admin_error(conn, "ban", e),
    }
}

//! Contest command handlers
//!
//! Rejected contest commands are dropped without a reply; only a refused
//! start is reported back, since the sender is otherwise left waiting.

use crate::error::ContestError;
use crate::protocol::ServerMessage;
use crate::state::{AppState, Connection};
use crate::types::UserId;
use std::sync::Arc;

fn log_rejection(conn: &Connection, command: &str, err: &ContestError) {
    tracing::debug!(
        group_id = %conn.group_id,
        user_id = %conn.user_id,
        command,
        reason = %err,
        "Contest command ignored"
    );
}

pub async fn handle_start(
    state: &Arc<AppState>,
    conn: &Connection,
    duration: Option<i64>,
    voting_duration: Option<i64>,
) -> Option<ServerMessage> {
    match state.start_contest(conn, duration, voting_duration).await {
        Ok(()) => None,
        Err(e @ ContestError::AlreadyActive) => {
            Some(ServerMessage::error("CONTEST_ACTIVE", e.to_string()))
        }
        Err(e) => {
            log_rejection(conn, "start_contest", &e);
            None
        }
    }
}

pub async fn handle_submit(
    state: &Arc<AppState>,
    conn: &Connection,
    submission: String,
) -> Option<ServerMessage> {
    match state.submit_entry(conn, &submission).await {
        Ok(()) => Some(ServerMessage::SubmissionReceived),
        Err(e) => {
            log_rejection(conn, "submit_contest", &e);
            None
        }
    }
}

pub async fn handle_end_submission(
    state: &Arc<AppState>,
    conn: &Connection,
) -> Option<ServerMessage> {
    if let Err(e) = state.end_submission(conn).await {
        log_rejection(conn, "end_submission", &e);
    }
    None
}

pub async fn handle_vote(
    state: &Arc<AppState>,
    conn: &Connection,
    target: UserId,
    score: i64,
) -> Option<ServerMessage> {
    match state.cast_vote(conn, &target, score).await {
        Ok(()) => Some(ServerMessage::VoteReceived),
        Err(e) => {
            log_rejection(conn, "vote", &e);
            None
        }
    }
}

pub async fn handle_end_voting(state: &Arc<AppState>, conn: &Connection) -> Option<ServerMessage> {
    if let Err(e) = state.end_voting(conn).await {
        log_rejection(conn, "end_voting", &e);
    }
    None
}

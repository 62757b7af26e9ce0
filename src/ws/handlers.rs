//! WebSocket message dispatch
//!
//! Every inbound command passes the rate limiter first, then goes to the
//! matching handler module. After the command the group's contest deadlines
//! are checked so phases advance on activity even between sweeps.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::rate_limit::member_key;
use crate::state::{AppState, Connection};
use std::sync::Arc;

use super::{admin, contest};

/// Handle a client message and return an optional direct reply
pub async fn handle_message(
    msg: ClientMessage,
    conn: &Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let key = member_key(&conn.group_id, &conn.user_id);
    if !state.rate_limiter.check(&key).await {
        tracing::warn!(group_id = %conn.group_id, user_id = %conn.user_id, "Rate limited");
        return Some(ServerMessage::error(
            "RATE_LIMITED",
            "Rate limit exceeded. Please slow down.",
        ));
    }

    let response = dispatch(msg, conn, state).await;
    state.tick_group(&conn.group_id).await;
    response
}

async fn dispatch(
    msg: ClientMessage,
    conn: &Connection,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Chat { message } => {
            state.chat(conn, &message).await;
            None
        }

        ClientMessage::GetHistory => Some(ServerMessage::ContestHistory {
            history: state.recent_history(&conn.group_id).await,
        }),

        // Contest commands
        ClientMessage::StartContest {
            duration,
            voting_duration,
        } => contest::handle_start(state, conn, duration, voting_duration).await,

        ClientMessage::SubmitContest { submission } => {
            contest::handle_submit(state, conn, submission).await
        }

        ClientMessage::EndSubmission => contest::handle_end_submission(state, conn).await,

        ClientMessage::Vote {
            target_user_id,
            score,
        } => contest::handle_vote(state, conn, target_user_id, score).await,

        ClientMessage::EndVoting => contest::handle_end_voting(state, conn).await,

        // Admin commands (privilege checked against the group, not the connection cache)
        ClientMessage::PromoteAdmin { target_user_id } => {
            admin::handle_promote(state, conn, target_user_id).await
        }

        ClientMessage::Kick { target_user_id } => {
            admin::handle_kick(state, conn, target_user_id).await
        }

        ClientMessage::Ban { target_user_id } => {
            admin::handle_ban(state, conn, target_user_id).await
        }
    }
}

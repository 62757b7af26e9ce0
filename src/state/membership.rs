use super::{AppState, Group, Outbound, OutboundTx};
use crate::error::{AdminError, JoinError, CLOSE_BANNED, CLOSE_KICKED};
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const MAX_CHAT_CHARS: usize = 1000;

/// Identity of one websocket connection inside a group
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub conn_id: ConnId,
    pub group_id: GroupId,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct Joined {
    pub connection: Connection,
    pub is_admin: bool,
    pub members: usize,
}

impl AppState {
    /// Add a connection to a group, creating the group if needed
    ///
    /// Sends `welcome` to the new connection and `user_joined` to everyone else.
    pub async fn join(
        &self,
        group_id: &str,
        user_id: &str,
        tx: OutboundTx,
    ) -> Result<Joined, JoinError> {
        let mut groups = self.groups.write().await;
        let group = groups
            .entry(group_id.to_string())
            .or_insert_with(|| {
                tracing::info!(group_id, "Creating group");
                Arc::new(Mutex::new(Group::new(
                    group_id.to_string(),
                    self.config.history_cap,
                )))
            })
            .clone();
        let mut group = group.lock().await;

        if group.is_banned(user_id) {
            tracing::warn!(group_id, user_id, "Banned user tried to join");
            return Err(JoinError::Banned);
        }

        let conn_id = ulid::Ulid::new().to_string();
        let is_admin = group
            .add_member(conn_id.clone(), user_id.to_string(), tx)
            .is_admin;
        let members = group.member_count();

        tracing::info!(group_id, user_id, members, is_admin, "Member joined");

        group.send_to(
            &conn_id,
            ServerMessage::Welcome {
                message: format!("Welcome, {}!", user_id),
                user_id: user_id.to_string(),
                members,
                is_admin,
            },
        );
        group.broadcast(
            ServerMessage::UserJoined {
                user_id: user_id.to_string(),
                members,
            },
            Some(&conn_id),
        );

        Ok(Joined {
            connection: Connection {
                conn_id,
                group_id: group_id.to_string(),
                user_id: user_id.to_string(),
            },
            is_admin,
            members,
        })
    }

    /// Resolve a join code and join the group behind it
    pub async fn join_with_code(
        &self,
        code: &str,
        user_id: &str,
        tx: OutboundTx,
    ) -> Result<Joined, JoinError> {
        let group_id = self.resolve_code(code).await?;
        self.join(&group_id, user_id, tx).await
    }

    /// Relay a chat line to everyone in the group except the sender
    ///
    /// Returns false if the message was empty or the sender is gone.
    pub async fn chat(&self, conn: &Connection, message: &str) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        let Some(group) = self.group(&conn.group_id).await else {
            return false;
        };
        let group = group.lock().await;
        if group.member(&conn.conn_id).is_none() {
            return false;
        }

        group.broadcast(
            ServerMessage::Chat {
                user_id: conn.user_id.clone(),
                message: message.chars().take(MAX_CHAT_CHARS).collect(),
            },
            Some(&conn.conn_id),
        );
        true
    }

    /// Remove a connection; the last one out destroys the group with its contest and history
    pub async fn leave(&self, conn: &Connection) {
        let mut groups = self.groups.write().await;
        let Some(group) = groups.get(&conn.group_id).cloned() else {
            return;
        };
        let mut group = group.lock().await;

        // Already gone if it was kicked or banned
        if group.remove_member(&conn.conn_id).is_none() {
            return;
        }

        if group.is_empty() {
            drop(group);
            groups.remove(&conn.group_id);
            tracing::info!(group_id = %conn.group_id, "Last member left, group destroyed");
            return;
        }

        let members = group.member_count();
        tracing::info!(group_id = %conn.group_id, user_id = %conn.user_id, members, "Member left");
        group.broadcast(
            ServerMessage::UserLeft {
                user_id: conn.user_id.clone(),
                members,
            },
            None,
        );
    }

    /// Connection ids currently open under `user_id` in a group
    pub async fn find_connections(&self, group_id: &str, user_id: &str) -> Vec<ConnId> {
        let Some(group) = self.group(group_id).await else {
            return Vec::new();
        };
        let conns = group.lock().await.find_connections(user_id);
        conns
    }

    pub async fn is_admin(&self, group_id: &str, user_id: &str) -> bool {
        let Some(group) = self.group(group_id).await else {
            return false;
        };
        let is_admin = group.lock().await.is_admin(user_id);
        is_admin
    }

    pub async fn promote(&self, conn: &Connection, target: &str) -> Result<(), AdminError> {
        let group = self.group(&conn.group_id).await.ok_or(AdminError::NotMember)?;
        let mut group = group.lock().await;

        let by = group.promote(&conn.conn_id, target)?;
        tracing::info!(group_id = %conn.group_id, target, by = %by, "Admin promoted");

        group.broadcast(
            ServerMessage::AdminPromoted {
                user_id: target.to_string(),
            },
            None,
        );
        Ok(())
    }

    /// Close every connection of `target`
    pub async fn kick(&self, conn: &Connection, target: &str) -> Result<(), AdminError> {
        let group = self.group(&conn.group_id).await.ok_or(AdminError::NotMember)?;
        let mut group = group.lock().await;

        let (by, removed) = group.kick(&conn.conn_id, target)?;
        tracing::info!(group_id = %conn.group_id, target, by = %by, connections = removed.len(), "User kicked");

        let msg = ServerMessage::UserKicked {
            user_id: target.to_string(),
            by,
        };
        group.broadcast(msg.clone(), None);
        for member in removed {
            member.send(Outbound::Message(msg.clone()));
            member.send(Outbound::Close {
                code: CLOSE_KICKED,
                reason: "Kicked by an admin".to_string(),
            });
        }
        Ok(())
    }

    /// Ban `target` from the group for as long as the group lives
    pub async fn ban(&self, conn: &Connection, target: &str) -> Result<(), AdminError> {
        let group = self.group(&conn.group_id).await.ok_or(AdminError::NotMember)?;
        let mut group = group.lock().await;

        let (by, removed) = group.ban(&conn.conn_id, target)?;
        tracing::info!(group_id = %conn.group_id, target, by = %by, connections = removed.len(), "User banned");

        let msg = ServerMessage::UserBanned {
            user_id: target.to_string(),
            by,
        };
        group.broadcast(msg.clone(), None);
        for member in removed {
            member.send(Outbound::Message(msg.clone()));
            member.send(Outbound::Close {
                code: CLOSE_BANNED,
                reason: "Banned by an admin".to_string(),
            });
        }
        Ok(())
    }
}

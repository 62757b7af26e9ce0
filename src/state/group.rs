//! Per-group record: membership, roles, ban list, active contest, history.
//!
//! A `Group` is always accessed under its own mutex in `AppState`, so nothing
//! here does any locking itself.

use crate::contest::Contest;
use crate::error::AdminError;
use crate::history::History;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

/// What a connection's writer loop receives
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Send a close frame and drop the connection
    Close { code: u16, reason: String },
}

pub type OutboundTx = mpsc::UnboundedSender<Outbound>;
pub type OutboundRx = mpsc::UnboundedReceiver<Outbound>;

/// One live connection inside a group
#[derive(Debug, Clone)]
pub struct Member {
    pub conn_id: ConnId,
    pub user_id: UserId,
    /// Snapshot of the admin flag, refreshed on promotion
    pub is_admin: bool,
    tx: OutboundTx,
}

impl Member {
    /// Fire-and-forget; a closed connection is skipped
    pub fn send(&self, outbound: Outbound) {
        if self.tx.is_closed() {
            return;
        }
        let _ = self.tx.send(outbound);
    }
}

#[derive(Debug)]
pub struct Group {
    pub id: GroupId,
    /// Side table of live connections keyed by connection id
    members: HashMap<ConnId, Member>,
    admins: HashSet<UserId>,
    banned: HashSet<UserId>,
    pub contest: Option<Contest>,
    pub history: History,
}

impl Group {
    pub fn new(id: GroupId, history_cap: usize) -> Self {
        Self {
            id,
            members: HashMap::new(),
            admins: HashSet::new(),
            banned: HashSet::new(),
            contest: None,
            history: History::with_cap(history_cap),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, conn_id: &str) -> Option<&Member> {
        self.members.get(conn_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }

    pub fn is_banned(&self, user_id: &str) -> bool {
        self.banned.contains(user_id)
    }

    /// Register a connection. The first member of a fresh group becomes its admin.
    ///
    /// Callers check the ban list first.
    pub fn add_member(&mut self, conn_id: ConnId, user_id: UserId, tx: OutboundTx) -> &Member {
        if self.members.is_empty() && self.admins.is_empty() {
            self.admins.insert(user_id.clone());
        }
        let is_admin = self.admins.contains(&user_id);

        self.members.entry(conn_id.clone()).or_insert(Member {
            conn_id,
            user_id,
            is_admin,
            tx,
        })
    }

    pub fn remove_member(&mut self, conn_id: &str) -> Option<Member> {
        self.members.remove(conn_id)
    }

    /// Every connection currently open under `user_id`
    pub fn find_connections(&self, user_id: &str) -> Vec<ConnId> {
        self.members
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.conn_id.clone())
            .collect()
    }

    /// Resolve the acting connection and make sure it holds admin rights right now
    fn acting_admin(&self, conn_id: &str) -> Result<UserId, AdminError> {
        let member = self.member(conn_id).ok_or(AdminError::NotMember)?;
        if !self.is_admin(&member.user_id) {
            return Err(AdminError::NotAdmin);
        }
        Ok(member.user_id.clone())
    }

    /// Grant admin to `target`, refreshing the cached flag on its live connections
    pub fn promote(&mut self, acting_conn: &str, target: &str) -> Result<UserId, AdminError> {
        let acting = self.acting_admin(acting_conn)?;

        self.admins.insert(target.to_string());
        for member in self.members.values_mut().filter(|m| m.user_id == target) {
            member.is_admin = true;
        }
        Ok(acting)
    }

    fn check_moderation(&self, acting_conn: &str, target: &str) -> Result<UserId, AdminError> {
        let acting = self.acting_admin(acting_conn)?;
        if self.is_admin(target) {
            return Err(AdminError::TargetIsAdmin);
        }
        Ok(acting)
    }

    /// Remove every connection of `target`, returning them so they can be closed
    pub fn kick(
        &mut self,
        acting_conn: &str,
        target: &str,
    ) -> Result<(UserId, Vec<Member>), AdminError> {
        let acting = self.check_moderation(acting_conn, target)?;
        let conns = self.find_connections(target);
        if conns.is_empty() {
            return Err(AdminError::UnknownTarget(target.to_string()));
        }

        let removed = conns
            .iter()
            .filter_map(|conn_id| self.members.remove(conn_id))
            .collect();
        Ok((acting, removed))
    }

    /// Ban `target` and remove any of its connections
    ///
    /// The target does not need to be online; the ban blocks future joins either way.
    pub fn ban(
        &mut self,
        acting_conn: &str,
        target: &str,
    ) -> Result<(UserId, Vec<Member>), AdminError> {
        let acting = self.check_moderation(acting_conn, target)?;
        self.banned.insert(target.to_string());

        let removed = self
            .find_connections(target)
            .iter()
            .filter_map(|conn_id| self.members.remove(conn_id))
            .collect();
        Ok((acting, removed))
    }

    /// Deliver to every open connection, optionally skipping one
    pub fn broadcast(&self, msg: ServerMessage, except: Option<&str>) {
        for member in self.members.values() {
            if except == Some(member.conn_id.as_str()) {
                continue;
            }
            member.send(Outbound::Message(msg.clone()));
        }
    }

    pub fn send_to(&self, conn_id: &str, msg: ServerMessage) {
        if let Some(member) = self.members.get(conn_id) {
            member.send(Outbound::Message(msg));
        }
    }
}

mod codes;
mod contest;
mod group;
mod membership;

pub use codes::CreatedGroup;
pub use group::{Group, Member, Outbound, OutboundRx, OutboundTx};
pub use membership::{Connection, Joined};

use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A join code and the group it points at
#[derive(Debug, Clone)]
pub struct JoinCodeEntry {
    pub group_id: GroupId,
    pub expires_at: DateTime<Utc>,
}

/// Shared application state
///
/// Owns every group behind its own mutex: commands for one group are
/// serialized, different groups proceed independently. Lock order is always
/// `groups` map first, then a single group.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    groups: Arc<RwLock<HashMap<GroupId, Arc<Mutex<Group>>>>>,
    codes: Arc<RwLock<HashMap<JoinCode, JoinCodeEntry>>>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            rate_limiter: RateLimiter::new(config.rate_limit_max, config.rate_limit_window),
            config: Arc::new(config),
            groups: Arc::new(RwLock::new(HashMap::new())),
            codes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle to a live group, if it exists
    pub(crate) async fn group(&self, group_id: &str) -> Option<Arc<Mutex<Group>>> {
        self.groups.read().await.get(group_id).cloned()
    }

    pub async fn group_exists(&self, group_id: &str) -> bool {
        self.groups.read().await.contains_key(group_id)
    }

    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }

    /// Snapshot of all live groups, for sweeps
    pub(crate) async fn all_groups(&self) -> Vec<(GroupId, Arc<Mutex<Group>>)> {
        self.groups
            .read()
            .await
            .iter()
            .map(|(id, group)| (id.clone(), group.clone()))
            .collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

//! Per-member admission control for inbound commands
//!
//! Fixed window counter: every key gets `max_requests` commands per `window`.
//! The limiter only answers yes/no; telling the sender is the caller's job.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

pub const DEFAULT_MAX_REQUESTS: u32 = 50;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter state
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Map of member key to (request count, window start)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    /// Maximum requests per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Check if a command should be admitted
    /// Returns true if allowed, false if rate limited
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut requests = self.requests.write().await;
        let (count, window_start) = requests.entry(key.to_string()).or_insert((0, now));

        if now.saturating_duration_since(*window_start) > self.window {
            *count = 0;
            *window_start = now;
        }

        *count = count.saturating_add(1);
        *count <= self.max_requests
    }

    /// Clean up expired windows (call periodically)
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) <= self.window);
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Rate limit key for a member; identities are only meaningful within one group
pub fn member_key(group_id: &str, user_id: &str) -> String {
    format!("{}/{}", group_id, user_id)
}

use super::{AppState, JoinCodeEntry};
use crate::error::JoinError;
use crate::types::*;
use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Safe character set for join codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Generate a random join code
fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Codes are shown uppercase but typed however
fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedGroup {
    pub group_id: GroupId,
    pub join_code: JoinCode,
    pub expires_at: DateTime<Utc>,
}

impl AppState {
    /// Allocate a group id and a join code for it
    ///
    /// The group record itself appears when the first member joins.
    pub async fn create_group(&self) -> CreatedGroup {
        self.create_group_at(Utc::now()).await
    }

    pub(crate) async fn create_group_at(&self, now: DateTime<Utc>) -> CreatedGroup {
        let default_ttl = TimeDelta::hours(24);
        let expires_at = TimeDelta::from_std(self.config.join_code_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(now + default_ttl);
        let group_id = ulid::Ulid::new().to_string();

        let mut codes = self.codes.write().await;
        // Collisions only matter against codes that still resolve
        let join_code = loop {
            let code = generate_join_code();
            match codes.get(&code) {
                Some(entry) if entry.expires_at > now => continue,
                _ => break code,
            }
        };
        codes.insert(
            join_code.clone(),
            JoinCodeEntry {
                group_id: group_id.clone(),
                expires_at,
            },
        );

        tracing::info!(group_id = %group_id, join_code = %join_code, %expires_at, "Group created");

        CreatedGroup {
            group_id,
            join_code,
            expires_at,
        }
    }

    /// Look up the group behind a join code
    pub async fn resolve_code(&self, code: &str) -> Result<GroupId, JoinError> {
        self.resolve_code_at(code, Utc::now()).await
    }

    pub(crate) async fn resolve_code_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GroupId, JoinError> {
        let codes = self.codes.read().await;
        match codes.get(&normalize_code(code)) {
            Some(entry) if entry.expires_at > now => Ok(entry.group_id.clone()),
            _ => Err(JoinError::InvalidJoinCode),
        }
    }

    /// Drop expired codes; the groups themselves are untouched
    pub async fn purge_expired_codes(&self) -> usize {
        self.purge_expired_codes_at(Utc::now()).await
    }

    pub(crate) async fn purge_expired_codes_at(&self, now: DateTime<Utc>) -> usize {
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, entry| entry.expires_at > now);
        before - codes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn test_generated_codes_use_safe_charset() {
        for _ in 0..100 {
            let code = generate_join_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_code_resolves_case_insensitively() {
        let state = AppState::new();
        let created = state.create_group().await;

        assert_eq!(
            state.resolve_code(&created.join_code).await,
            Ok(created.group_id.clone())
        );
        assert_eq!(
            state
                .resolve_code(&format!(" {} ", created.join_code.to_lowercase()))
                .await,
            Ok(created.group_id)
        );
        assert_eq!(
            state.resolve_code("NOPE42").await,
            Err(JoinError::InvalidJoinCode)
        );
    }

    #[tokio::test]
    async fn test_code_expires_after_ttl() {
        let state = AppState::new();
        let now = Utc::now();
        let created = state.create_group_at(now).await;
        assert_eq!(created.expires_at, now + TimeDelta::hours(24));

        let almost = now + TimeDelta::hours(24) - TimeDelta::seconds(1);
        assert!(state.resolve_code_at(&created.join_code, almost).await.is_ok());

        let expired = now + TimeDelta::hours(24);
        assert_eq!(
            state.resolve_code_at(&created.join_code, expired).await,
            Err(JoinError::InvalidJoinCode)
        );
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_falls_back_to_default() {
        let now = Utc::now();

        // Too long for a TimeDelta at all
        let state = AppState::with_config(AppConfig {
            join_code_ttl: Duration::from_secs(u64::MAX),
            ..AppConfig::default()
        });
        let created = state.create_group_at(now).await;
        assert_eq!(created.expires_at, now + TimeDelta::hours(24));

        // Fits a TimeDelta but runs past the last representable date
        let state = AppState::with_config(AppConfig {
            join_code_ttl: Duration::from_secs(1_000_000_000_000_000),
            ..AppConfig::default()
        });
        let created = state.create_group_at(now).await;
        assert_eq!(created.expires_at, now + TimeDelta::hours(24));
        assert!(state.resolve_code_at(&created.join_code, now).await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_leaves_group_alone() {
        let state = AppState::new();
        let now = Utc::now();
        let created = state.create_group_at(now).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        state.join(&created.group_id, "alice", tx).await.unwrap();

        assert_eq!(state.purge_expired_codes_at(now).await, 0);
        assert_eq!(
            state
                .purge_expired_codes_at(now + TimeDelta::hours(25))
                .await,
            1
        );
        assert!(state.group_exists(&created.group_id).await);
    }
}

use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// How often join codes and rate limit windows are cleaned up
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a background task that advances contests whose phase deadline passed,
/// so idle groups still move on without waiting for the next command
pub fn spawn_deadline_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let period = state.config.deadline_sweep;

        loop {
            tokio::time::sleep(period).await;

            let advanced = state.sweep_deadlines().await;
            if advanced > 0 {
                tracing::debug!(advanced, "Deadline sweep advanced contests");
            }
        }
    });
}

/// Spawn a background task that drops expired join codes and stale rate limit windows
pub fn spawn_housekeeping(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(HOUSEKEEPING_INTERVAL).await;

            let purged = state.purge_expired_codes().await;
            if purged > 0 {
                tracing::info!(purged, "Expired join codes removed");
            }
            state.rate_limiter.cleanup().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::ContestPhase;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_sweeper_advances_idle_group() {
        let state = Arc::new(AppState::with_config(AppConfig {
            deadline_sweep: Duration::from_millis(10),
            ..AppConfig::default()
        }));
        let (tx, _rx) = mpsc::unbounded_channel();
        let alice = state.join("g1", "alice", tx).await.unwrap().connection;
        state.start_contest(&alice, Some(20), None).await.unwrap();

        spawn_deadline_sweeper(state.clone());

        // No commands are sent; only the sweeper can move the contest on
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(state.contest_phase("g1").await, Some(ContestPhase::Voting));
    }
}

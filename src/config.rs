//! Server configuration loaded from environment variables

use crate::history::DEFAULT_HISTORY_CAP;
use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:6574";
pub const DEFAULT_JOIN_CODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_DEADLINE_SWEEP: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Commands admitted per member per window
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// How long a join code stays valid after the group is created
    pub join_code_ttl: Duration,
    /// How often idle groups are checked for expired phase deadlines
    pub deadline_sweep: Duration,
    /// Concluded contests kept per group
    pub history_cap: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 6574)),
            rate_limit_max: DEFAULT_MAX_REQUESTS,
            rate_limit_window: DEFAULT_WINDOW,
            join_code_ttl: DEFAULT_JOIN_CODE_TTL,
            deadline_sweep: DEFAULT_DEADLINE_SWEEP,
            history_cap: DEFAULT_HISTORY_CAP,
        }
    }
}

/// Parse an env var, falling back to `default` when unset or invalid
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
                default
            }
        },
        Err(_) => default,
    }
}

impl AppConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env_or("BIND_ADDR", defaults.bind_addr);
        let rate_limit_max = env_or("RATE_LIMIT_MAX", defaults.rate_limit_max);
        let window_secs = env_or("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit_window.as_secs());
        let ttl_hours = env_or(
            "JOIN_CODE_TTL_HOURS",
            defaults.join_code_ttl.as_secs() / 3600,
        );
        let sweep_ms = env_or(
            "DEADLINE_SWEEP_MS",
            defaults.deadline_sweep.as_millis() as u64,
        );
        let history_cap = env_or("HISTORY_CAP", defaults.history_cap);

        let config = Self {
            bind_addr,
            rate_limit_max,
            rate_limit_window: Duration::from_secs(window_secs),
            join_code_ttl: Duration::from_secs(ttl_hours.saturating_mul(3600)),
            // A zero period would spin the sweeper
            deadline_sweep: Duration::from_millis(sweep_ms.max(10)),
            history_cap,
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            rate_limit_max = config.rate_limit_max,
            rate_limit_window_secs = window_secs,
            join_code_ttl_hours = ttl_hours,
            deadline_sweep_ms = config.deadline_sweep.as_millis() as u64,
            history_cap = config.history_cap,
            "Config loaded"
        );

        config
    }
}

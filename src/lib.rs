// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod contest;
pub mod error;
pub mod history;
pub mod protocol;
pub mod rate_limit;
pub mod state;
pub mod sweeper;
pub mod types;
pub mod ws;

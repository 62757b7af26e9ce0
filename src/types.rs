use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque ID types for readability
pub type GroupId = String;
pub type UserId = String;
pub type ConnId = String;
pub type JoinCode = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContestPhase {
    Submission,
    Voting,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub user_id: UserId,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
}

/// One row of a finalized contest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContestResult {
    pub user_id: UserId,
    pub submission: String,
    pub score: u32,
    pub votes: u32,
}

/// Snapshot of a concluded contest kept in the group's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub ended_at: DateTime<Utc>,
    pub creator: UserId,
    pub top_results: Vec<ContestResult>,
    pub participants: usize,
}

/// Public submission info shown when voting opens (no scores)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionInfo {
    pub user_id: UserId,
    pub text: String,
}

impl From<&Submission> for SubmissionInfo {
    fn from(s: &Submission) -> Self {
        Self {
            user_id: s.user_id.clone(),
            text: s.text.clone(),
        }
    }
}

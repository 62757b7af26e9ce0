use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Accept any JSON number for a duration; fractions are truncated and
/// out-of-range values are left for clamping
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Chat {
        message: String,
    },
    StartContest {
        /// Submission phase length in milliseconds
        #[serde(default, deserialize_with = "lenient_millis")]
        duration: Option<i64>,
        /// Voting phase length in milliseconds
        #[serde(default, deserialize_with = "lenient_millis")]
        voting_duration: Option<i64>,
    },
    SubmitContest {
        submission: String,
    },
    EndSubmission,
    Vote {
        target_user_id: UserId,
        /// Signed so out-of-range values still parse and get rejected by the engine
        score: i64,
    },
    EndVoting,
    GetHistory,
    PromoteAdmin {
        target_user_id: UserId,
    },
    Kick {
        target_user_id: UserId,
    },
    Ban {
        target_user_id: UserId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        message: String,
        user_id: UserId,
        members: usize,
        is_admin: bool,
    },
    UserJoined {
        user_id: UserId,
        members: usize,
    },
    UserLeft {
        user_id: UserId,
        members: usize,
    },
    Chat {
        user_id: UserId,
        message: String,
    },
    ContestStarted {
        creator: UserId,
        submission_deadline: DateTime<Utc>,
        voting_duration_ms: u64,
        server_now: DateTime<Utc>,
    },
    /// Sent only to the submitting member
    SubmissionReceived,
    VotingStarted {
        submissions: Vec<SubmissionInfo>,
        voting_deadline: DateTime<Utc>,
        server_now: DateTime<Utc>,
    },
    /// Sent only to the voter
    VoteReceived,
    ContestEnded {
        results: Vec<ContestResult>,
    },
    ContestHistory {
        history: Vec<HistoryEntry>,
    },
    AdminPromoted {
        user_id: UserId,
    },
    UserKicked {
        user_id: UserId,
        by: UserId,
    },
    UserBanned {
        user_id: UserId,
        by: UserId,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_contest_with_optional_durations() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"start_contest"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartContest {
                duration: None,
                voting_duration: None
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_contest","duration":1000,"voting_duration":2000}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartContest {
                duration: Some(1000),
                voting_duration: Some(2000)
            }
        );
    }

    #[test]
    fn test_parse_start_contest_with_odd_durations() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_contest","duration":-5}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartContest {
                duration: Some(-5),
                voting_duration: None
            }
        );

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"start_contest","duration":1500.7,"voting_duration":null}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartContest {
                duration: Some(1500),
                voting_duration: None
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_contest","duration":18446744073709551615}"#)
                .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::StartContest {
                duration: Some(ms),
                ..
            } if ms > 0
        ));
    }

    #[test]
    fn test_parse_vote_accepts_out_of_range_score() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"vote","target_user_id":"bob","score":42}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Vote {
                target_user_id: "bob".to_string(),
                score: 42
            }
        );
    }

    #[test]
    fn test_unknown_command_is_malformed() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"chat"}"#).is_err());
    }

    #[test]
    fn test_server_message_tagging() {
        let json = serde_json::to_value(ServerMessage::SubmissionReceived).unwrap();
        assert_eq!(json, serde_json::json!({"type": "submission_received"}));

        let json = serde_json::to_value(ServerMessage::error("RATE_LIMITED", "slow down")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "RATE_LIMITED");
        assert_eq!(json["message"], "slow down");
    }
}

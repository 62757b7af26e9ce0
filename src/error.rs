//! Error taxonomy for group and contest operations.
//!
//! None of these are fatal to a connection. Contest rejections are logged and
//! dropped, admin failures are reported back to the sender, and join failures
//! refuse the connection with a close code.

use crate::types::ContestPhase;

/// Why a contest command was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContestError {
    #[error("A contest is already running in this group")]
    AlreadyActive,

    #[error("No contest is running in this group")]
    NoActiveContest,

    #[error("Command not valid in {0:?} phase")]
    WrongPhase(ContestPhase),

    #[error("The phase deadline has passed")]
    DeadlinePassed,

    #[error("Only the contest creator can do that")]
    NotCreator,

    #[error("Score {0} is outside 1..=10")]
    ScoreOutOfRange(i64),

    #[error("Members cannot vote for themselves")]
    SelfVote,

    #[error("{0} has no submission in this contest")]
    UnknownTarget(String),

    #[error("Connection is no longer part of this group")]
    NotMember,
}

/// Why an admin action (promote/kick/ban) was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    #[error("Only admins can do that")]
    NotAdmin,

    #[error("Admins cannot be kicked or banned")]
    TargetIsAdmin,

    #[error("{0} is not connected to this group")]
    UnknownTarget(String),

    #[error("Connection is no longer part of this group")]
    NotMember,
}

/// Why a connection was refused at join time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Invalid or expired join code")]
    InvalidJoinCode,

    #[error("You are banned from this group")]
    Banned,
}

impl JoinError {
    /// Websocket close code sent to the refused client
    pub fn close_code(&self) -> u16 {
        match self {
            JoinError::InvalidJoinCode => CLOSE_INVALID_CODE,
            JoinError::Banned => CLOSE_BANNED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            JoinError::InvalidJoinCode => "INVALID_JOIN_CODE",
            JoinError::Banned => "BANNED",
        }
    }
}

impl AdminError {
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::NotAdmin => "UNAUTHORIZED",
            AdminError::TargetIsAdmin => "TARGET_IS_ADMIN",
            AdminError::UnknownTarget(_) => "UNKNOWN_TARGET",
            AdminError::NotMember => "NOT_MEMBER",
        }
    }
}

/// Close codes in the application range (4000-4999)
pub const CLOSE_KICKED: u16 = 4001;
pub const CLOSE_BANNED: u16 = 4003;
pub const CLOSE_INVALID_CODE: u16 = 4004;

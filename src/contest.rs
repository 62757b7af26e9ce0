//! Contest state machine
//!
//! A contest moves strictly forward: SUBMISSION -> VOTING -> ENDED. Every
//! operation takes the current time explicitly so deadline behavior is
//! deterministic and the coordinator decides where "now" comes from.

use crate::error::ContestError;
use crate::types::*;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

pub const MAX_SUBMISSION_CHARS: usize = 1000;
pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;
/// Number of results kept in a history snapshot
pub const HISTORY_TOP_N: usize = 3;

pub const DEFAULT_SUBMISSION_MS: u64 = 5 * 60 * 1000;
pub const MAX_SUBMISSION_MS: u64 = 60 * 60 * 1000;
pub const DEFAULT_VOTING_MS: u64 = 5 * 60 * 1000;
pub const MAX_VOTING_MS: u64 = 30 * 60 * 1000;

/// Phase lengths after clamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContestDurations {
    pub submission_ms: u64,
    pub voting_ms: u64,
}

impl Default for ContestDurations {
    fn default() -> Self {
        Self {
            submission_ms: DEFAULT_SUBMISSION_MS,
            voting_ms: DEFAULT_VOTING_MS,
        }
    }
}

impl ContestDurations {
    /// Missing, zero or negative falls back to the default, anything longer is capped
    pub fn clamped(submission_ms: Option<i64>, voting_ms: Option<i64>) -> Self {
        fn clamp(value: Option<i64>, default: u64, max: u64) -> u64 {
            match value {
                None | Some(..=0) => default,
                Some(ms) => u64::try_from(ms).map_or(max, |ms| ms.min(max)),
            }
        }

        Self {
            submission_ms: clamp(submission_ms, DEFAULT_SUBMISSION_MS, MAX_SUBMISSION_MS),
            voting_ms: clamp(voting_ms, DEFAULT_VOTING_MS, MAX_VOTING_MS),
        }
    }
}

fn millis(ms: u64) -> TimeDelta {
    TimeDelta::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

/// Emitted when voting opens
#[derive(Debug, Clone, PartialEq)]
pub struct VotingOpened {
    pub submissions: Vec<SubmissionInfo>,
    pub voting_deadline: DateTime<Utc>,
}

/// Emitted when a contest is finalized
#[derive(Debug, Clone, PartialEq)]
pub struct ContestOutcome {
    pub results: Vec<ContestResult>,
    pub history: HistoryEntry,
}

/// A deadline-driven phase change
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    VotingOpened(VotingOpened),
    Ended(ContestOutcome),
}

#[derive(Debug, Clone)]
pub struct Contest {
    pub creator: UserId,
    pub created_at: DateTime<Utc>,
    pub phase: ContestPhase,
    pub submission_deadline: DateTime<Utc>,
    pub voting_deadline: Option<DateTime<Utc>>,
    pub voting_duration_ms: u64,
    /// Kept in first-submission order, which is also the scoring tie-break
    submissions: Vec<Submission>,
    /// voter -> (target -> score)
    votes: HashMap<UserId, HashMap<UserId, u8>>,
}

impl Contest {
    pub fn new(creator: UserId, now: DateTime<Utc>, durations: ContestDurations) -> Self {
        Self {
            creator,
            created_at: now,
            phase: ContestPhase::Submission,
            submission_deadline: now + millis(durations.submission_ms),
            voting_deadline: None,
            voting_duration_ms: durations.voting_ms,
            submissions: Vec::new(),
            votes: HashMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != ContestPhase::Ended
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn vote_count(&self) -> usize {
        self.votes.values().map(|targets| targets.len()).sum()
    }

    fn require_phase(&self, phase: ContestPhase) -> Result<(), ContestError> {
        if self.phase != phase {
            return Err(ContestError::WrongPhase(self.phase));
        }
        Ok(())
    }

    /// Record (or overwrite) a member's entry
    pub fn submit(
        &mut self,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ContestError> {
        self.require_phase(ContestPhase::Submission)?;
        if now >= self.submission_deadline {
            return Err(ContestError::DeadlinePassed);
        }

        let text: String = text.chars().take(MAX_SUBMISSION_CHARS).collect();

        match self.submissions.iter_mut().find(|s| s.user_id == user_id) {
            Some(existing) => {
                existing.text = text;
                existing.submitted_at = now;
            }
            None => self.submissions.push(Submission {
                user_id: user_id.to_string(),
                text,
                submitted_at: now,
            }),
        }
        Ok(())
    }

    /// Creator-triggered end of the submission phase
    pub fn end_submission(
        &mut self,
        acting: &str,
        now: DateTime<Utc>,
    ) -> Result<VotingOpened, ContestError> {
        if acting != self.creator {
            return Err(ContestError::NotCreator);
        }
        self.open_voting(now)
    }

    fn open_voting(&mut self, now: DateTime<Utc>) -> Result<VotingOpened, ContestError> {
        self.require_phase(ContestPhase::Submission)?;

        let voting_deadline = now + millis(self.voting_duration_ms);
        self.phase = ContestPhase::Voting;
        self.voting_deadline = Some(voting_deadline);

        Ok(VotingOpened {
            submissions: self.submissions.iter().map(SubmissionInfo::from).collect(),
            voting_deadline,
        })
    }

    pub fn vote(
        &mut self,
        voter: &str,
        target: &str,
        score: i64,
        now: DateTime<Utc>,
    ) -> Result<(), ContestError> {
        self.require_phase(ContestPhase::Voting)?;
        if self.voting_deadline.is_some_and(|deadline| now >= deadline) {
            return Err(ContestError::DeadlinePassed);
        }
        let score = u8::try_from(score)
            .ok()
            .filter(|s| (MIN_SCORE..=MAX_SCORE).contains(&i64::from(*s)))
            .ok_or(ContestError::ScoreOutOfRange(score))?;
        if voter == target {
            return Err(ContestError::SelfVote);
        }
        if !self.submissions.iter().any(|s| s.user_id == target) {
            return Err(ContestError::UnknownTarget(target.to_string()));
        }

        self.votes
            .entry(voter.to_string())
            .or_default()
            .insert(target.to_string(), score);
        Ok(())
    }

    /// Creator-triggered end of voting
    pub fn end_voting(
        &mut self,
        acting: &str,
        now: DateTime<Utc>,
    ) -> Result<ContestOutcome, ContestError> {
        if acting != self.creator {
            return Err(ContestError::NotCreator);
        }
        self.finalize(now)
    }

    fn finalize(&mut self, now: DateTime<Utc>) -> Result<ContestOutcome, ContestError> {
        self.require_phase(ContestPhase::Voting)?;
        self.phase = ContestPhase::Ended;

        let results = self.results();
        let history = HistoryEntry {
            ended_at: now,
            creator: self.creator.clone(),
            top_results: results.iter().take(HISTORY_TOP_N).cloned().collect(),
            participants: self.submissions.len(),
        };

        Ok(ContestOutcome { results, history })
    }

    /// Tally scores for every submitter, highest first
    ///
    /// Members nobody voted for still appear with a score of 0. Equal totals
    /// keep first-submission order.
    pub fn results(&self) -> Vec<ContestResult> {
        let mut results: Vec<ContestResult> = self
            .submissions
            .iter()
            .map(|s| ContestResult {
                user_id: s.user_id.clone(),
                submission: s.text.clone(),
                score: 0,
                votes: 0,
            })
            .collect();

        for targets in self.votes.values() {
            for (target, score) in targets {
                if let Some(result) = results.iter_mut().find(|r| &r.user_id == target) {
                    result.score += u32::from(*score);
                    result.votes += 1;
                }
            }
        }

        results.sort_by(|a, b| b.score.cmp(&a.score));
        results
    }

    /// Apply whichever deadline has passed, if any
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        match self.phase {
            ContestPhase::Submission if now >= self.submission_deadline => {
                self.open_voting(now).ok().map(Transition::VotingOpened)
            }
            ContestPhase::Voting if self.voting_deadline.is_some_and(|d| now >= d) => {
                self.finalize(now).ok().map(Transition::Ended)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ms(n: i64) -> TimeDelta {
        TimeDelta::milliseconds(n)
    }

    fn contest_in_voting() -> Contest {
        let now = t0();
        let mut contest = Contest::new(
            "alice".to_string(),
            now,
            ContestDurations::clamped(Some(1000), Some(1000)),
        );
        contest.submit("bob", "hello", now).unwrap();
        contest.submit("carol", "world", now).unwrap();
        contest.end_submission("alice", now + ms(10)).unwrap();
        contest
    }

    #[test]
    fn test_durations_are_clamped() {
        let d = ContestDurations::clamped(None, None);
        assert_eq!(d, ContestDurations::default());

        let d = ContestDurations::clamped(Some(0), Some(0));
        assert_eq!(d.submission_ms, DEFAULT_SUBMISSION_MS);
        assert_eq!(d.voting_ms, DEFAULT_VOTING_MS);

        let d = ContestDurations::clamped(Some(-5), Some(i64::MIN));
        assert_eq!(d, ContestDurations::default());

        let d = ContestDurations::clamped(Some(i64::MAX), Some(i64::MAX));
        assert_eq!(d.submission_ms, MAX_SUBMISSION_MS);
        assert_eq!(d.voting_ms, MAX_VOTING_MS);

        let d = ContestDurations::clamped(Some(1500), Some(2500));
        assert_eq!(d.submission_ms, 1500);
        assert_eq!(d.voting_ms, 2500);
    }

    #[test]
    fn test_new_contest_starts_in_submission() {
        let contest = Contest::new("alice".to_string(), t0(), ContestDurations::default());
        assert_eq!(contest.phase, ContestPhase::Submission);
        assert_eq!(contest.submission_deadline, t0() + ms(5 * 60 * 1000));
        assert!(contest.voting_deadline.is_none());
        assert!(contest.is_active());
    }

    #[test]
    fn test_submit_after_deadline_is_rejected() {
        let mut contest = Contest::new(
            "alice".to_string(),
            t0(),
            ContestDurations::clamped(Some(1000), None),
        );
        contest.submit("bob", "on time", t0() + ms(999)).unwrap();

        let result = contest.submit("carol", "too late", t0() + ms(1000));
        assert_eq!(result, Err(ContestError::DeadlinePassed));
        assert_eq!(contest.submissions().len(), 1);
    }

    #[test]
    fn test_submit_overwrites_and_truncates() {
        let mut contest = Contest::new("alice".to_string(), t0(), ContestDurations::default());
        contest.submit("bob", "first", t0()).unwrap();
        contest.submit("carol", "other", t0()).unwrap();
        contest.submit("bob", &"x".repeat(1500), t0()).unwrap();

        let subs = contest.submissions();
        assert_eq!(subs.len(), 2);
        // Overwrite keeps the original position
        assert_eq!(subs[0].user_id, "bob");
        assert_eq!(subs[0].text.chars().count(), MAX_SUBMISSION_CHARS);
    }

    #[test]
    fn test_end_submission_requires_creator() {
        let mut contest = Contest::new("alice".to_string(), t0(), ContestDurations::default());
        assert_eq!(
            contest.end_submission("bob", t0()),
            Err(ContestError::NotCreator)
        );
        assert_eq!(contest.phase, ContestPhase::Submission);

        let opened = contest.end_submission("alice", t0()).unwrap();
        assert_eq!(contest.phase, ContestPhase::Voting);
        assert_eq!(opened.voting_deadline, t0() + ms(DEFAULT_VOTING_MS as i64));
        assert_eq!(contest.voting_deadline, Some(opened.voting_deadline));
    }

    #[test]
    fn test_invalid_votes_leave_vote_map_unchanged() {
        let mut contest = contest_in_voting();
        let now = t0() + ms(20);

        assert_eq!(
            contest.vote("bob", "carol", 0, now),
            Err(ContestError::ScoreOutOfRange(0))
        );
        assert_eq!(
            contest.vote("bob", "carol", 11, now),
            Err(ContestError::ScoreOutOfRange(11))
        );
        assert_eq!(
            contest.vote("bob", "carol", -3, now),
            Err(ContestError::ScoreOutOfRange(-3))
        );
        assert_eq!(
            contest.vote("bob", "bob", 5, now),
            Err(ContestError::SelfVote)
        );
        assert_eq!(
            contest.vote("bob", "alice", 5, now),
            Err(ContestError::UnknownTarget("alice".to_string()))
        );
        assert_eq!(contest.vote_count(), 0);

        contest.vote("bob", "carol", 10, now).unwrap();
        contest.vote("bob", "carol", 1, now).unwrap();
        assert_eq!(contest.vote_count(), 1);
    }

    #[test]
    fn test_vote_after_deadline_rejected() {
        let mut contest = contest_in_voting();
        let deadline = contest.voting_deadline.unwrap();
        assert_eq!(
            contest.vote("bob", "carol", 5, deadline),
            Err(ContestError::DeadlinePassed)
        );
    }

    #[test]
    fn test_vote_during_submission_rejected() {
        let mut contest = Contest::new("alice".to_string(), t0(), ContestDurations::default());
        contest.submit("bob", "hi", t0()).unwrap();
        assert_eq!(
            contest.vote("carol", "bob", 5, t0()),
            Err(ContestError::WrongPhase(ContestPhase::Submission))
        );
    }

    #[test]
    fn test_finalize_orders_by_score_and_includes_zero() {
        let mut contest = Contest::new("alice".to_string(), t0(), ContestDurations::default());
        contest.submit("bob", "b", t0()).unwrap();
        contest.submit("carol", "c", t0()).unwrap();
        contest.submit("dave", "d", t0()).unwrap();
        contest.end_submission("alice", t0()).unwrap();

        contest.vote("bob", "carol", 8, t0()).unwrap();
        contest.vote("carol", "bob", 5, t0()).unwrap();
        contest.vote("alice", "carol", 2, t0()).unwrap();

        let outcome = contest.end_voting("alice", t0()).unwrap();
        let order: Vec<_> = outcome.results.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(order, vec!["carol", "bob", "dave"]);
        assert_eq!(outcome.results[0].score, 10);
        assert_eq!(outcome.results[0].votes, 2);
        assert_eq!(outcome.results[2].score, 0);
        assert_eq!(outcome.results[2].votes, 0);
        assert_eq!(outcome.history.participants, 3);
        assert_eq!(outcome.history.creator, "alice");
        assert_eq!(contest.phase, ContestPhase::Ended);
    }

    #[test]
    fn test_ties_keep_submission_order() {
        let mut contest = Contest::new("alice".to_string(), t0(), ContestDurations::default());
        for user in ["e", "d", "c", "b"] {
            contest.submit(user, user, t0()).unwrap();
        }
        contest.end_submission("alice", t0()).unwrap();
        let outcome = contest.end_voting("alice", t0()).unwrap();

        let order: Vec<_> = outcome.results.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(order, vec!["e", "d", "c", "b"]);
        assert_eq!(outcome.history.top_results.len(), HISTORY_TOP_N);
        assert_eq!(outcome.history.participants, 4);
    }

    #[test]
    fn test_ended_contest_refuses_everything() {
        let mut contest = contest_in_voting();
        contest.end_voting("alice", t0() + ms(20)).unwrap();
        let now = t0() + ms(30);

        assert!(contest.submit("bob", "again", now).is_err());
        assert!(contest.vote("bob", "carol", 5, now).is_err());
        assert!(contest.end_submission("alice", now).is_err());
        assert!(contest.end_voting("alice", now).is_err());
        assert!(contest.advance(now + ms(1_000_000)).is_none());
        assert!(!contest.is_active());
    }

    #[test]
    fn test_advance_follows_deadlines() {
        let mut contest = Contest::new(
            "alice".to_string(),
            t0(),
            ContestDurations::clamped(Some(1000), Some(2000)),
        );
        contest.submit("bob", "hello", t0()).unwrap();

        assert!(contest.advance(t0() + ms(999)).is_none());

        match contest.advance(t0() + ms(1000)) {
            Some(Transition::VotingOpened(opened)) => {
                assert_eq!(opened.submissions.len(), 1);
                assert_eq!(opened.voting_deadline, t0() + ms(3000));
            }
            other => panic!("Expected VotingOpened, got {:?}", other),
        }

        // Voting never gets skipped, even when both deadlines are long past
        assert_eq!(contest.phase, ContestPhase::Voting);
        assert!(contest.advance(t0() + ms(2999)).is_none());

        match contest.advance(t0() + ms(3000)) {
            Some(Transition::Ended(outcome)) => {
                assert_eq!(outcome.results.len(), 1);
                assert_eq!(outcome.results[0].score, 0);
            }
            other => panic!("Expected Ended, got {:?}", other),
        }
        assert!(contest.advance(t0() + ms(10_000)).is_none());
    }
}

use super::{AppState, Connection, Group};
use crate::contest::{Contest, ContestDurations, Transition, VotingOpened};
use crate::error::ContestError;
use crate::history::HISTORY_VIEW;
use crate::protocol::ServerMessage;
use crate::types::*;
use chrono::{DateTime, Utc};

/// Publish a phase change to the group; an ended contest moves into history
fn apply_transition(group: &mut Group, transition: Transition, now: DateTime<Utc>) {
    match transition {
        Transition::VotingOpened(VotingOpened {
            submissions,
            voting_deadline,
        }) => {
            tracing::info!(
                group_id = %group.id,
                submissions = submissions.len(),
                %voting_deadline,
                "Voting started"
            );
            group.broadcast(
                ServerMessage::VotingStarted {
                    submissions,
                    voting_deadline,
                    server_now: now,
                },
                None,
            );
        }
        Transition::Ended(outcome) => {
            tracing::info!(
                group_id = %group.id,
                participants = outcome.history.participants,
                "Contest ended"
            );
            group.contest = None;
            group.history.record(outcome.history);
            group.broadcast(
                ServerMessage::ContestEnded {
                    results: outcome.results,
                },
                None,
            );
        }
    }
}

/// The active contest, if the connection is still a member
fn active_contest<'a>(
    group: &'a mut Group,
    conn: &Connection,
) -> Result<&'a mut Contest, ContestError> {
    if group.member(&conn.conn_id).is_none() {
        return Err(ContestError::NotMember);
    }
    group
        .contest
        .as_mut()
        .filter(|c| c.is_active())
        .ok_or(ContestError::NoActiveContest)
}

impl AppState {
    /// Start a contest and announce it to the whole group
    pub async fn start_contest(
        &self,
        conn: &Connection,
        submission_ms: Option<i64>,
        voting_ms: Option<i64>,
    ) -> Result<(), ContestError> {
        let group = self
            .group(&conn.group_id)
            .await
            .ok_or(ContestError::NotMember)?;
        let mut group = group.lock().await;

        if group.member(&conn.conn_id).is_none() {
            return Err(ContestError::NotMember);
        }

        // A contest whose voting deadline already passed must not block a new one
        let now = Utc::now();
        if let Some(transition) = group.contest.as_mut().and_then(|c| c.advance(now)) {
            apply_transition(&mut group, transition, now);
        }
        if group.contest.as_ref().is_some_and(|c| c.is_active()) {
            return Err(ContestError::AlreadyActive);
        }

        let durations = ContestDurations::clamped(submission_ms, voting_ms);
        let contest = Contest::new(conn.user_id.clone(), now, durations);

        tracing::info!(
            group_id = %conn.group_id,
            creator = %conn.user_id,
            submission_ms = durations.submission_ms,
            voting_ms = durations.voting_ms,
            "Contest started"
        );

        let msg = ServerMessage::ContestStarted {
            creator: contest.creator.clone(),
            submission_deadline: contest.submission_deadline,
            voting_duration_ms: contest.voting_duration_ms,
            server_now: now,
        };
        group.contest = Some(contest);
        group.broadcast(msg, None);
        Ok(())
    }

    /// Record the member's entry; only the submitter is acknowledged
    pub async fn submit_entry(&self, conn: &Connection, text: &str) -> Result<(), ContestError> {
        let group = self
            .group(&conn.group_id)
            .await
            .ok_or(ContestError::NotMember)?;
        let mut group = group.lock().await;

        active_contest(&mut group, conn)?.submit(&conn.user_id, text, Utc::now())
    }

    pub async fn end_submission(&self, conn: &Connection) -> Result<(), ContestError> {
        let group = self
            .group(&conn.group_id)
            .await
            .ok_or(ContestError::NotMember)?;
        let mut group = group.lock().await;

        let now = Utc::now();
        let opened = active_contest(&mut group, conn)?.end_submission(&conn.user_id, now)?;
        apply_transition(&mut group, Transition::VotingOpened(opened), now);
        Ok(())
    }

    pub async fn cast_vote(
        &self,
        conn: &Connection,
        target: &str,
        score: i64,
    ) -> Result<(), ContestError> {
        let group = self
            .group(&conn.group_id)
            .await
            .ok_or(ContestError::NotMember)?;
        let mut group = group.lock().await;

        active_contest(&mut group, conn)?.vote(&conn.user_id, target, score, Utc::now())
    }

    pub async fn end_voting(&self, conn: &Connection) -> Result<(), ContestError> {
        let group = self
            .group(&conn.group_id)
            .await
            .ok_or(ContestError::NotMember)?;
        let mut group = group.lock().await;

        let now = Utc::now();
        let outcome = active_contest(&mut group, conn)?.end_voting(&conn.user_id, now)?;
        apply_transition(&mut group, Transition::Ended(outcome), now);
        Ok(())
    }

    /// The last few concluded contests, oldest first
    pub async fn recent_history(&self, group_id: &str) -> Vec<HistoryEntry> {
        let Some(group) = self.group(group_id).await else {
            return Vec::new();
        };
        let recent = group.lock().await.history.recent(HISTORY_VIEW);
        recent
    }

    /// Current phase of the group's contest, if one is running
    pub async fn contest_phase(&self, group_id: &str) -> Option<ContestPhase> {
        let group = self.group(group_id).await?;
        let group = group.lock().await;
        group.contest.as_ref().map(|c| c.phase)
    }

    /// Apply any deadline that has passed in this group
    ///
    /// Returns true if a phase changed.
    pub async fn tick_group(&self, group_id: &str) -> bool {
        self.tick_group_at(group_id, Utc::now()).await
    }

    pub(crate) async fn tick_group_at(&self, group_id: &str, now: DateTime<Utc>) -> bool {
        let Some(group) = self.group(group_id).await else {
            return false;
        };
        let mut group = group.lock().await;

        let Some(transition) = group.contest.as_mut().and_then(|c| c.advance(now)) else {
            return false;
        };
        tracing::debug!(group_id, "Deadline passed");
        apply_transition(&mut group, transition, now);
        true
    }

    /// Tick every group with a running contest; returns how many changed phase
    pub async fn sweep_deadlines(&self) -> usize {
        let now = Utc::now();
        let mut advanced = 0;

        for (group_id, group) in self.all_groups().await {
            let mut group = group.lock().await;
            if let Some(transition) = group.contest.as_mut().and_then(|c| c.advance(now)) {
                tracing::debug!(group_id = %group_id, "Deadline passed during sweep");
                apply_transition(&mut group, transition, now);
                advanced += 1;
            }
        }

        advanced
    }
}

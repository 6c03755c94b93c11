//! Folds check runs, commit statuses and mergeability into one status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::github::models::{
    CheckConclusion, CheckRun, CommitState, CommitStatus, MergeStateDetail, Mergeable, PullRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifiedStatus {
    Success,
    Failed,
    InProgress,
    Unknown,
}

impl UnifiedStatus {
    pub fn label(self) -> &'static str {
        match self {
            UnifiedStatus::Success => "passing",
            UnifiedStatus::Failed => "failing",
            UnifiedStatus::InProgress => "running",
            UnifiedStatus::Unknown => "unknown",
        }
    }
}

/// Conflicted and dirty. A visible conflict outranks every check result.
pub fn has_branch_conflict(pr: &PullRequest) -> bool {
    pr.mergeable == Mergeable::Conflicted && pr.merge_state == MergeStateDetail::Dirty
}

pub fn has_failing_checks(pr: &PullRequest) -> bool {
    let failed_run = pr
        .check_runs
        .iter()
        .any(|run| run.conclusion.is_some_and(|c| c.is_failure()));
    let failed_status = pr
        .commit_statuses
        .iter()
        .any(|s| matches!(s.state, CommitState::Failure | CommitState::Error));
    failed_run || failed_status
}

fn has_pending_checks(pr: &PullRequest) -> bool {
    pr.check_runs.iter().any(CheckRun::is_pending)
        || pr
            .commit_statuses
            .iter()
            .any(|s| s.state == CommitState::Pending)
}

/// Precedence, first match wins: conflict, no signals, failure, pending,
/// all green, otherwise unknown.
pub fn reconcile(pr: &PullRequest) -> UnifiedStatus {
    if has_branch_conflict(pr) {
        return UnifiedStatus::Failed;
    }

    if pr.check_runs.is_empty() && pr.commit_statuses.is_empty() {
        return UnifiedStatus::Unknown;
    }

    if has_failing_checks(pr) {
        return UnifiedStatus::Failed;
    }

    if has_pending_checks(pr) {
        return UnifiedStatus::InProgress;
    }

    let runs_green = pr
        .check_runs
        .iter()
        .all(|run| run.conclusion == Some(CheckConclusion::Success));
    let statuses_green = pr
        .commit_statuses
        .iter()
        .all(|s| s.state == CommitState::Success);

    if runs_green && statuses_green {
        UnifiedStatus::Success
    } else {
        UnifiedStatus::Unknown
    }
}

/// Someone has been asked to review and someone owns the PR. Both lists must
/// be non-empty.
pub fn needs_review(pr: &PullRequest) -> bool {
    !pr.requested_reviewers.is_empty() && !pr.assignees.is_empty()
}

/// One entry per check-run id. A later duplicate replaces the earlier one in
/// place, so output order follows first appearance.
pub fn dedup_check_runs(runs: Vec<CheckRun>) -> Vec<CheckRun> {
    let mut positions: HashMap<u64, usize> = HashMap::with_capacity(runs.len());
    let mut unique: Vec<CheckRun> = Vec::with_capacity(runs.len());

    for run in runs {
        match positions.get(&run.id) {
            Some(&idx) => unique[idx] = run,
            None => {
                positions.insert(run.id, unique.len());
                unique.push(run);
            }
        }
    }

    unique
}

/// Keeps the newest status for each context, ordered by first appearance.
/// Ties on `updated_at` go to the earlier entry, since GitHub lists statuses
/// newest first.
pub fn latest_status_per_context(statuses: Vec<CommitStatus>) -> Vec<CommitStatus> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(statuses.len());
    let mut latest: Vec<CommitStatus> = Vec::with_capacity(statuses.len());

    for status in statuses {
        match positions.get(&status.context) {
            Some(&idx) => {
                if status.updated_at > latest[idx].updated_at {
                    latest[idx] = status;
                }
            }
            None => {
                positions.insert(status.context.clone(), latest.len());
                latest.push(status);
            }
        }
    }

    latest
}

use chrono::{DateTime, Utc};

use crate::github::models::PullRequest;
use crate::reconcile::{has_branch_conflict, has_failing_checks, needs_review};
use crate::util::config::QueryConfiguration;

/// One query's pull requests for the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub query: QueryConfiguration,
    pub pull_requests: Vec<PullRequest>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Loading,
    Loaded(Vec<QueryResult>),
    Error(String),
}

impl RefreshState {
    pub fn is_loading(&self) -> bool {
        matches!(self, RefreshState::Loading)
    }

    /// A cycle has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, RefreshState::Loaded(_) | RefreshState::Error(_))
    }

    pub fn results(&self) -> &[QueryResult] {
        match self {
            RefreshState::Loaded(results) => results,
            _ => &[],
        }
    }
}

/// Everything the scheduler publishes to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub state: RefreshState,
    pub current_user_login: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn pending_actions_count(&self) -> usize {
        pending_actions_count(self.state.results(), self.current_user_login.as_deref())
    }
}

/// PRs waiting on someone, counted per query result:
/// review requests under queries that count reviews, plus the viewer's own
/// failing or conflicted PRs under queries that count failures.
pub fn pending_actions_count(results: &[QueryResult], viewer_login: Option<&str>) -> usize {
    results
        .iter()
        .map(|result| {
            result
                .pull_requests
                .iter()
                .filter(|pr| requires_action(pr, &result.query, viewer_login))
                .count()
        })
        .sum()
}

fn requires_action(
    pr: &PullRequest,
    query: &QueryConfiguration,
    viewer_login: Option<&str>,
) -> bool {
    let review_pending = query.include_in_pending_reviews_count && needs_review(pr);
    let own_broken = query.include_in_failing_checks_count
        && viewer_login.is_some_and(|login| pr.author == login)
        && (has_failing_checks(pr) || has_branch_conflict(pr));
    review_pending || own_broken
}

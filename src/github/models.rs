use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Upstream-computed mergeability. `Conflicted` is the "mergeable = false" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mergeable {
    Mergeable,
    Conflicted,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MergeStateDetail {
    Clean,
    Dirty,
    Blocked,
    Behind,
    Unstable,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    Unknown,
}

impl CheckConclusion {
    pub fn is_failure(self) -> bool {
        matches!(self, CheckConclusion::Failure | CheckConclusion::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub number: u32,
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: String,
    pub status: CheckStatus,
    pub conclusion: Option<CheckConclusion>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub name: String,
    pub status: CheckStatus,
    /// `None` until the run has completed.
    pub conclusion: Option<CheckConclusion>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub details_url: Option<String>,
    pub app_slug: Option<String>,
    /// Only populated for runs enriched through the workflow-jobs endpoint.
    pub jobs: Option<Vec<WorkflowJob>>,
}

impl CheckRun {
    pub fn is_pending(&self) -> bool {
        matches!(self.status, CheckStatus::Queued | CheckStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Success,
    Failure,
    Error,
    Pending,
}

/// Legacy commit status, keyed by context on the upstream side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub id: u64,
    pub state: CommitState,
    pub description: Option<String>,
    pub target_url: Option<String>,
    pub context: String,
    pub creator: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub number: u32,
    pub title: String,
    pub url: String,
    pub author: String,
    pub is_draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub repository: Option<RepositoryRef>,
    pub head_sha: Option<String>,
    pub mergeable: Mergeable,
    pub merge_state: MergeStateDetail,
    pub requested_reviewers: Vec<String>,
    pub assignees: Vec<String>,
    pub check_runs: Vec<CheckRun>,
    pub commit_statuses: Vec<CommitStatus>,
}

impl PullRequest {
    pub fn repo_owner(&self) -> Option<&str> {
        self.repository.as_ref().map(|r| r.owner.as_str())
    }

    pub fn repo_name(&self) -> Option<&str> {
        self.repository.as_ref().map(|r| r.name.as_str())
    }

    pub fn repo_full_name(&self) -> Option<String> {
        self.repository.as_ref().map(RepositoryRef::full_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RateLimit {
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: Option<DateTime<Utc>>,
}

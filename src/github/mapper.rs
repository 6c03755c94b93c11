//! Pure conversion of GitHub payloads into the domain model.
//!
//! GraphQL nodes (camelCase, opaque string ids, SCREAMING enums) and REST
//! objects (snake_case, numeric ids, lowercase enums) both land in the same
//! shapes. Missing or malformed fields degrade to defaults; nothing here fails.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use super::models::*;
use super::node_id::decode_node_id;
use crate::reconcile::dedup_check_runs;

static NULL: Value = Value::Null;

const DEFAULT_API_URL: &str = "https://api.github.com";

/// First non-null value among `keys`.
fn field<'a>(node: &'a Value, keys: &[&str]) -> &'a Value {
    keys.iter()
        .map(|k| &node[*k])
        .find(|v| !v.is_null())
        .unwrap_or(&NULL)
}

fn str_field(node: &Value, keys: &[&str]) -> Option<String> {
    field(node, keys).as_str().map(|s| s.to_string())
}

fn logins(nodes: &Value) -> Vec<String> {
    nodes
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|n| n["login"].as_str().or_else(|| n["slug"].as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Strict RFC 3339 parse. Unparseable or missing input degrades to "now" so a
/// single bad timestamp never sinks a whole batch.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    match raw {
        Some(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                warn!(value = s, error = %e, "Unparseable timestamp, using now");
                Utc::now()
            }
        },
        None => Utc::now(),
    }
}

/// Like [`parse_timestamp`] but absent values stay absent.
pub fn parse_optional_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(|s| parse_timestamp(Some(s)))
}

/// Extracts owner/name from `<api base>/repos/<owner>/<repo>[/...]`.
#[derive(Debug, Clone)]
pub struct RepositoryUrlPattern {
    regex: Option<Regex>,
}

impl RepositoryUrlPattern {
    pub fn new(api_url: &str) -> Self {
        let base = regex::escape(api_url.trim_end_matches('/'));
        let pattern = format!(r"^{base}/repos/([^/]+)/([^/]+)(?:/.*)?$");
        Self {
            regex: Regex::new(&pattern).ok(),
        }
    }

    pub fn parse(&self, url: &str) -> Option<RepositoryRef> {
        let caps = self.regex.as_ref()?.captures(url)?;
        Some(RepositoryRef {
            owner: caps.get(1)?.as_str().to_string(),
            name: caps.get(2)?.as_str().to_string(),
        })
    }
}

impl Default for RepositoryUrlPattern {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

pub fn parse_mergeable(value: &Value) -> Mergeable {
    match value {
        Value::Bool(true) => Mergeable::Mergeable,
        Value::Bool(false) => Mergeable::Conflicted,
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "mergeable" => Mergeable::Mergeable,
            "conflicting" => Mergeable::Conflicted,
            _ => Mergeable::Unknown,
        },
        _ => Mergeable::Unknown,
    }
}

pub fn parse_merge_state(raw: Option<&str>) -> MergeStateDetail {
    match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("clean") => MergeStateDetail::Clean,
        Some("dirty") => MergeStateDetail::Dirty,
        Some("blocked") => MergeStateDetail::Blocked,
        Some("behind") => MergeStateDetail::Behind,
        Some("unstable") => MergeStateDetail::Unstable,
        _ => MergeStateDetail::Unknown,
    }
}

pub fn parse_check_status(raw: Option<&str>) -> CheckStatus {
    match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("completed") => CheckStatus::Completed,
        Some("in_progress") => CheckStatus::InProgress,
        _ => CheckStatus::Queued,
    }
}

pub fn parse_conclusion(raw: Option<&str>) -> Option<CheckConclusion> {
    let raw = raw?.to_ascii_lowercase();
    Some(match raw.as_str() {
        "success" => CheckConclusion::Success,
        "failure" | "startup_failure" => CheckConclusion::Failure,
        "neutral" => CheckConclusion::Neutral,
        "cancelled" => CheckConclusion::Cancelled,
        "skipped" => CheckConclusion::Skipped,
        "timed_out" => CheckConclusion::TimedOut,
        "action_required" => CheckConclusion::ActionRequired,
        "stale" => CheckConclusion::Stale,
        _ => CheckConclusion::Unknown,
    })
}

pub fn parse_commit_state(raw: Option<&str>) -> CommitState {
    match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("success") => CommitState::Success,
        Some("failure") => CommitState::Failure,
        Some("error") => CommitState::Error,
        _ => CommitState::Pending,
    }
}

/// Numeric ids pass through; opaque GraphQL ids are decoded.
pub fn parse_id(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => decode_node_id(s),
        _ => 0,
    }
}

/// `suite_app_slug` is supplied when the run came from a GraphQL check suite.
pub fn map_check_run(node: &Value, suite_app_slug: Option<&str>) -> CheckRun {
    let status = parse_check_status(field(node, &["status"]).as_str());
    let conclusion = parse_conclusion(field(node, &["conclusion"]).as_str());

    CheckRun {
        id: parse_id(&node["id"]),
        name: str_field(node, &["name"]).unwrap_or_default(),
        status,
        conclusion,
        started_at: parse_optional_timestamp(field(node, &["startedAt", "started_at"]).as_str()),
        completed_at: parse_optional_timestamp(
            field(node, &["completedAt", "completed_at"]).as_str(),
        ),
        details_url: str_field(node, &["detailsUrl", "details_url", "html_url"]),
        app_slug: suite_app_slug
            .map(|s| s.to_string())
            .or_else(|| node["app"]["slug"].as_str().map(|s| s.to_string())),
        jobs: None,
    }
}

pub fn map_commit_status(node: &Value) -> CommitStatus {
    let created_at = parse_timestamp(field(node, &["createdAt", "created_at"]).as_str());
    let updated_at = match field(node, &["updatedAt", "updated_at"]).as_str() {
        Some(s) => parse_timestamp(Some(s)),
        None => created_at,
    };

    CommitStatus {
        id: parse_id(&node["id"]),
        state: parse_commit_state(field(node, &["state"]).as_str()),
        description: str_field(node, &["description"]),
        target_url: str_field(node, &["targetUrl", "target_url"]),
        context: str_field(node, &["context"]).unwrap_or_default(),
        creator: node["creator"]["login"].as_str().map(|s| s.to_string()),
        created_at,
        updated_at,
    }
}

pub fn map_workflow_step(node: &Value) -> WorkflowStep {
    WorkflowStep {
        number: field(node, &["number"]).as_u64().unwrap_or(0) as u32,
        name: str_field(node, &["name"]).unwrap_or_default(),
        status: parse_check_status(field(node, &["status"]).as_str()),
        conclusion: parse_conclusion(field(node, &["conclusion"]).as_str()),
        started_at: parse_optional_timestamp(field(node, &["startedAt", "started_at"]).as_str()),
        completed_at: parse_optional_timestamp(
            field(node, &["completedAt", "completed_at"]).as_str(),
        ),
    }
}

pub fn map_workflow_job(node: &Value) -> WorkflowJob {
    let steps = node["steps"]
        .as_array()
        .map(|arr| arr.iter().map(map_workflow_step).collect())
        .unwrap_or_default();

    WorkflowJob {
        id: parse_id(&node["id"]),
        name: str_field(node, &["name"]).unwrap_or_default(),
        status: parse_check_status(field(node, &["status"]).as_str()),
        conclusion: parse_conclusion(field(node, &["conclusion"]).as_str()),
        started_at: parse_optional_timestamp(field(node, &["startedAt", "started_at"]).as_str()),
        completed_at: parse_optional_timestamp(
            field(node, &["completedAt", "completed_at"]).as_str(),
        ),
        steps,
    }
}

/// Check runs of every suite on the head commit, deduplicated by id.
fn graphql_check_runs(commit: &Value) -> Vec<CheckRun> {
    let mut runs = Vec::new();
    for suite in commit["checkSuites"]["nodes"].as_array().into_iter().flatten() {
        let slug = suite["app"]["slug"].as_str();
        for run in suite["checkRuns"]["nodes"].as_array().into_iter().flatten() {
            runs.push(map_check_run(run, slug));
        }
    }
    dedup_check_runs(runs)
}

fn graphql_commit_statuses(commit: &Value) -> Vec<CommitStatus> {
    commit["status"]["contexts"]
        .as_array()
        .map(|arr| arr.iter().map(map_commit_status).collect())
        .unwrap_or_default()
}

/// A `search` result node from the GraphQL transport.
pub fn map_graphql_pull_request(node: &Value) -> PullRequest {
    let repository = match (
        node["repository"]["owner"]["login"].as_str(),
        node["repository"]["name"].as_str(),
    ) {
        (Some(owner), Some(name)) => Some(RepositoryRef {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        _ => None,
    };

    let reviewers = node["reviewRequests"]["nodes"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let reviewer = &r["requestedReviewer"];
                    reviewer["login"]
                        .as_str()
                        .or_else(|| reviewer["slug"].as_str())
                        .map(|s| s.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let commit = &node["commits"]["nodes"][0]["commit"];

    PullRequest {
        id: parse_id(&node["id"]),
        number: node["number"].as_u64().unwrap_or(0) as u32,
        title: str_field(node, &["title"]).unwrap_or_default(),
        url: str_field(node, &["url"]).unwrap_or_default(),
        author: node["author"]["login"]
            .as_str()
            .unwrap_or("ghost")
            .to_string(),
        is_draft: node["isDraft"].as_bool().unwrap_or(false),
        created_at: parse_timestamp(node["createdAt"].as_str()),
        updated_at: parse_timestamp(node["updatedAt"].as_str()),
        repository,
        head_sha: node["headRefOid"]
            .as_str()
            .or_else(|| commit["oid"].as_str())
            .map(|s| s.to_string()),
        mergeable: parse_mergeable(&node["mergeable"]),
        merge_state: parse_merge_state(node["mergeStateStatus"].as_str()),
        requested_reviewers: reviewers,
        assignees: logins(&node["assignees"]["nodes"]),
        check_runs: graphql_check_runs(commit),
        commit_statuses: graphql_commit_statuses(commit),
    }
}

/// A REST search item (`/search/issues`) or pull detail (`/pulls/{n}`).
///
/// Check runs and statuses are fetched separately on the REST path, so they
/// start empty here.
pub fn map_rest_pull_request(node: &Value, repo_urls: &RepositoryUrlPattern) -> PullRequest {
    let repository = node["repository_url"]
        .as_str()
        .and_then(|url| repo_urls.parse(url))
        .or_else(|| {
            let repo = &node["base"]["repo"];
            match (repo["owner"]["login"].as_str(), repo["name"].as_str()) {
                (Some(owner), Some(name)) => Some(RepositoryRef {
                    owner: owner.to_string(),
                    name: name.to_string(),
                }),
                _ => None,
            }
        });

    let mut reviewers = logins(&node["requested_reviewers"]);
    reviewers.extend(logins(&node["requested_teams"]));

    PullRequest {
        id: parse_id(&node["id"]),
        number: node["number"].as_u64().unwrap_or(0) as u32,
        title: str_field(node, &["title"]).unwrap_or_default(),
        url: str_field(node, &["html_url", "url"]).unwrap_or_default(),
        author: node["user"]["login"].as_str().unwrap_or("ghost").to_string(),
        is_draft: node["draft"].as_bool().unwrap_or(false),
        created_at: parse_timestamp(node["created_at"].as_str()),
        updated_at: parse_timestamp(node["updated_at"].as_str()),
        repository,
        head_sha: node["head"]["sha"].as_str().map(|s| s.to_string()),
        mergeable: parse_mergeable(&node["mergeable"]),
        merge_state: parse_merge_state(node["mergeable_state"].as_str()),
        requested_reviewers: reviewers,
        assignees: logins(&node["assignees"]),
        check_runs: Vec::new(),
        commit_statuses: Vec::new(),
    }
}

/// Dispatch on payload shape: GraphQL nodes carry string ids or camelCase
/// GraphQL-only fields.
pub fn map_pull_request(node: &Value, repo_urls: &RepositoryUrlPattern) -> PullRequest {
    let is_graphql = node["id"].is_string()
        || node.get("headRefOid").is_some()
        || node["repository"].is_object();
    if is_graphql {
        map_graphql_pull_request(node)
    } else {
        map_rest_pull_request(node, repo_urls)
    }
}

pub fn map_rate_limit(node: &Value) -> RateLimit {
    RateLimit {
        remaining: node["remaining"].as_u64().unwrap_or(0) as u32,
        limit: node["limit"].as_u64().unwrap_or(0) as u32,
        reset_at: parse_optional_timestamp(node["resetAt"].as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_url_pattern() {
        let pattern = RepositoryUrlPattern::default();
        assert_eq!(
            pattern.parse("https://api.github.com/repos/rust-lang/rust"),
            Some(RepositoryRef {
                owner: "rust-lang".into(),
                name: "rust".into(),
            })
        );
        assert_eq!(
            pattern
                .parse("https://api.github.com/repos/rust-lang/rust/pulls/1")
                .map(|r| r.full_name()),
            Some("rust-lang/rust".to_string())
        );
    }

    #[test]
    fn test_repository_url_rejects_malformed() {
        let pattern = RepositoryUrlPattern::default();
        assert_eq!(pattern.parse("invalid-url"), None);
        assert_eq!(pattern.parse(""), None);
        assert_eq!(pattern.parse("https://api.github.com/repos/only-owner"), None);
        assert_eq!(pattern.parse("https://api.github.com/repos//repo"), None);
        assert_eq!(
            pattern.parse("https://evil.example.com/api.github.com/repos/a/b"),
            None
        );
        assert_eq!(pattern.parse("https://api.githubXcom/repos/a/b"), None);
    }

    #[test]
    fn test_enterprise_repository_url() {
        let pattern = RepositoryUrlPattern::new("https://ghe.example.com/api/v3/");
        assert_eq!(
            pattern
                .parse("https://ghe.example.com/api/v3/repos/team/service")
                .map(|r| r.full_name()),
            Some("team/service".to_string())
        );
        assert_eq!(
            pattern.parse("https://api.github.com/repos/team/service"),
            None
        );
    }

    #[test]
    fn test_merge_state_normalization() {
        assert_eq!(parse_merge_state(Some("DIRTY")), MergeStateDetail::Dirty);
        assert_eq!(parse_merge_state(Some("clean")), MergeStateDetail::Clean);
        assert_eq!(parse_merge_state(Some("Behind")), MergeStateDetail::Behind);
        assert_eq!(parse_merge_state(Some("HAS_HOOKS")), MergeStateDetail::Unknown);
        assert_eq!(parse_merge_state(Some("")), MergeStateDetail::Unknown);
        assert_eq!(parse_merge_state(None), MergeStateDetail::Unknown);
    }

    #[test]
    fn test_bad_timestamp_degrades_to_now() {
        let before = Utc::now();
        let parsed = parse_timestamp(Some("yesterday-ish"));
        assert!(parsed >= before);
    }
}

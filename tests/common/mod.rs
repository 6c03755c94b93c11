#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::watch;

use prwatch::github::models::*;
use prwatch::github::{ApiError, ApiRequest, Gateway};
use prwatch::util::config::QueryConfiguration;

type Handler = dyn Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync;

/// In-process gateway driven by a closure, with per-search delays, an
/// optional release gate and call accounting.
pub struct FakeGateway {
    handler: Box<Handler>,
    delays: HashMap<String, Duration>,
    gate: Option<watch::Receiver<bool>>,
    calls: Mutex<Vec<ApiRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delays: HashMap::new(),
            gate: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every call whose search string is `query`.
    pub fn with_delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    /// Every call blocks until `true` is sent on the returned sender.
    pub fn held(mut self) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&ApiRequest) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| predicate(r)).count()
    }

    pub fn viewer_calls(&self) -> usize {
        self.count_calls(is_viewer)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn execute(&self, _credential: &str, request: ApiRequest) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            let _ = gate.wait_for(|open| *open).await;
        }

        let delay = search_string(&request).and_then(|q| self.delays.get(q).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.handler)(&request)
    }
}

/// The search string carried by a GraphQL search or a REST issue search.
pub fn search_string(request: &ApiRequest) -> Option<&str> {
    match request {
        ApiRequest::GraphQl { variables, .. } => variables["query"].as_str(),
        ApiRequest::Rest { path, params, .. } if path == "/search/issues" => params
            .iter()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.as_str()),
        ApiRequest::Rest { .. } => None,
    }
}

pub fn is_viewer(request: &ApiRequest) -> bool {
    matches!(request, ApiRequest::GraphQl { variables, .. } if variables.get("query").is_none())
}

pub fn rest_path(request: &ApiRequest) -> Option<&str> {
    match request {
        ApiRequest::Rest { path, .. } => Some(path.as_str()),
        ApiRequest::GraphQl { .. } => None,
    }
}

/// Answers the viewer query with `login` and each search from `results`;
/// unknown searches return an empty page.
pub fn graphql_handler(
    login: &str,
    results: Vec<(&str, Result<Vec<Value>, ApiError>)>,
) -> impl Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static {
    let login = login.to_string();
    let results: HashMap<String, Result<Vec<Value>, ApiError>> = results
        .into_iter()
        .map(|(q, r)| (q.to_string(), r))
        .collect();

    move |request: &ApiRequest| {
        if is_viewer(request) {
            return Ok(viewer_response(&login));
        }
        match search_string(request).and_then(|q| results.get(q)) {
            Some(Ok(nodes)) => Ok(search_page(nodes.clone())),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(search_page(Vec::new())),
        }
    }
}

pub fn viewer_response(login: &str) -> Value {
    json!({ "data": { "viewer": { "login": login } } })
}

pub fn search_page(nodes: Vec<Value>) -> Value {
    json!({
        "data": {
            "rateLimit": { "remaining": 4999, "limit": 5000, "resetAt": "2024-06-01T13:00:00Z" },
            "search": {
                "issueCount": nodes.len(),
                "pageInfo": { "hasNextPage": false, "endCursor": null },
                "nodes": nodes,
            }
        }
    })
}

/// Minimal GraphQL search node for a pull request.
pub fn pr_node(number: u32, author: &str) -> Value {
    json!({
        "id": format!("PR_kwDOAAAB{number}"),
        "number": number,
        "title": format!("PR {number}"),
        "url": format!("https://github.com/acme/widgets/pull/{number}"),
        "isDraft": false,
        "createdAt": "2024-05-01T10:00:00Z",
        "updatedAt": "2024-05-02T10:00:00Z",
        "author": { "login": author },
        "repository": { "name": "widgets", "owner": { "login": "acme" } },
        "headRefOid": "abc123",
        "mergeable": "MERGEABLE",
        "mergeStateStatus": "CLEAN",
        "reviewRequests": { "nodes": [] },
        "assignees": { "nodes": [] },
        "commits": { "nodes": [] }
    })
}

pub fn query(id: &str) -> QueryConfiguration {
    QueryConfiguration::new(id, &id.to_uppercase(), &format!("search-{id}"))
}

pub fn pull_request(number: u32, author: &str) -> PullRequest {
    PullRequest {
        id: number as u64,
        number,
        title: format!("PR {number}"),
        url: format!("https://github.com/acme/widgets/pull/{number}"),
        author: author.to_string(),
        is_draft: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        repository: Some(RepositoryRef {
            owner: "acme".into(),
            name: "widgets".into(),
        }),
        head_sha: Some("abc123".into()),
        mergeable: Mergeable::Mergeable,
        merge_state: MergeStateDetail::Clean,
        requested_reviewers: vec![],
        assignees: vec![],
        check_runs: vec![],
        commit_statuses: vec![],
    }
}

pub fn check_run(id: u64, status: CheckStatus, conclusion: Option<CheckConclusion>) -> CheckRun {
    CheckRun {
        id,
        name: format!("check-{id}"),
        status,
        conclusion,
        started_at: None,
        completed_at: None,
        details_url: None,
        app_slug: None,
        jobs: None,
    }
}

pub fn completed(id: u64, conclusion: CheckConclusion) -> CheckRun {
    check_run(id, CheckStatus::Completed, Some(conclusion))
}

pub fn commit_status(context: &str, state: CommitState) -> CommitStatus {
    CommitStatus {
        id: 1,
        state,
        description: None,
        target_url: None,
        context: context.to_string(),
        creator: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

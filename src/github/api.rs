use futures::future::join_all;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::error::{ApiError, TransportKind};
use super::gateway::{ApiRequest, Gateway};
use super::mapper::{
    RepositoryUrlPattern, map_check_run, map_commit_status, map_graphql_pull_request,
    map_rate_limit, map_rest_pull_request, map_workflow_job,
};
use super::models::{CheckRun, CommitStatus, PullRequest, RepositoryRef};
use super::queries;
use crate::reconcile::{dedup_check_runs, latest_status_per_context};

const PAGE_SIZE: usize = 100;

/// Search endpoints stop serving results past this offset.
const SEARCH_RESULT_CAP: usize = 1000;

/// One cycle's view of the API: a gateway, the credential for this cycle, and
/// the permit pool every call draws from.
pub struct ApiSession<'a> {
    gateway: &'a dyn Gateway,
    credential: &'a str,
    permits: &'a Semaphore,
    repo_urls: &'a RepositoryUrlPattern,
}

impl<'a> ApiSession<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        credential: &'a str,
        permits: &'a Semaphore,
        repo_urls: &'a RepositoryUrlPattern,
    ) -> Self {
        Self {
            gateway,
            credential,
            permits,
            repo_urls,
        }
    }

    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ApiError::transport(TransportKind::Other, e.to_string()))?;
        self.gateway.execute(self.credential, request).await
    }

    pub async fn fetch_viewer(&self) -> Result<String, ApiError> {
        let data = self
            .call(ApiRequest::graphql(queries::VIEWER_QUERY, json!({})))
            .await?;
        let login = data["data"]["viewer"]["login"]
            .as_str()
            .ok_or_else(|| ApiError::decoding("Missing viewer login"))?
            .to_string();
        debug!(login = %login, "Fetched viewer");
        Ok(login)
    }

    /// Paginated GraphQL search. Check runs arrive already deduplicated.
    pub async fn search_graphql(
        &self,
        query_string: &str,
        max_results: usize,
    ) -> Result<Vec<PullRequest>, ApiError> {
        let max_results = max_results.min(SEARCH_RESULT_CAP);
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let mut all_prs = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let first = (max_results - all_prs.len()).min(PAGE_SIZE);
            let variables = json!({
                "query": query_string,
                "first": first,
                "cursor": cursor,
            });

            let data = self
                .call(ApiRequest::graphql(queries::SEARCH_PRS_QUERY, variables))
                .await?;

            let rate_limit = map_rate_limit(&data["data"]["rateLimit"]);
            debug!(
                remaining = rate_limit.remaining,
                limit = rate_limit.limit,
                "GraphQL rate limit"
            );

            let search_data = &data["data"]["search"];
            let nodes = search_data["nodes"]
                .as_array()
                .ok_or_else(|| ApiError::decoding("Missing search nodes"))?;

            for node in nodes {
                // Non-PR results come back as empty objects.
                if node.get("number").is_none() {
                    continue;
                }
                all_prs.push(map_graphql_pull_request(node));
            }

            let page_info = &search_data["pageInfo"];
            let has_next = page_info["hasNextPage"].as_bool().unwrap_or(false);
            if has_next && all_prs.len() < max_results {
                cursor = page_info["endCursor"].as_str().map(|s| s.to_string());
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        all_prs.truncate(max_results);
        debug!(
            query = query_string,
            count = all_prs.len(),
            "GraphQL search complete"
        );
        Ok(all_prs)
    }

    /// REST issue search. The returned PRs carry only search-item fields;
    /// see [`ApiSession::enrich_pull_request`].
    pub async fn search_rest(
        &self,
        query_string: &str,
        max_results: usize,
    ) -> Result<Vec<PullRequest>, ApiError> {
        let max_results = max_results.min(SEARCH_RESULT_CAP);
        let per_page = max_results.clamp(1, PAGE_SIZE);
        let mut all_prs = Vec::new();
        let mut page = 1;

        loop {
            let request = ApiRequest::get("/search/issues")
                .param("q", query_string)
                .param("per_page", per_page.to_string())
                .param("page", page.to_string());
            let data = self.call(request).await?;

            let items = data["items"]
                .as_array()
                .ok_or_else(|| ApiError::decoding("Missing search items"))?;

            for item in items {
                if item.get("pull_request").is_none() {
                    continue;
                }
                all_prs.push(map_rest_pull_request(item, self.repo_urls));
            }

            // Non-PR items are skipped, so the offset can hit the cap first.
            if items.len() < per_page
                || all_prs.len() >= max_results
                || page * per_page >= SEARCH_RESULT_CAP
            {
                break;
            }
            page += 1;
        }

        all_prs.truncate(max_results);
        debug!(
            query = query_string,
            count = all_prs.len(),
            "REST search complete"
        );
        Ok(all_prs)
    }

    /// Secondary fan-out for one REST search hit: pull detail, check runs,
    /// commit statuses, then workflow jobs for runs owned by `workflow_app`.
    /// Each piece that fails is logged and left at its default.
    pub async fn enrich_pull_request(&self, pr: PullRequest, workflow_app: &str) -> PullRequest {
        let Some(repo) = pr.repository.clone() else {
            warn!(url = %pr.url, "Cannot enrich PR without a repository");
            return pr;
        };

        let mut pr = match self.fetch_pull_detail(&repo, pr.number).await {
            Ok(mut detail) => {
                if detail.repository.is_none() {
                    detail.repository = Some(repo.clone());
                }
                detail
            }
            Err(e) => {
                warn!(repo = %repo.full_name(), number = pr.number, error = %e, "Failed to fetch PR detail");
                pr
            }
        };

        let Some(sha) = pr.head_sha.clone() else {
            return pr;
        };

        let (runs, statuses) = tokio::join!(
            self.fetch_check_runs(&repo, &sha),
            self.fetch_commit_statuses(&repo, &sha),
        );

        let runs = runs.unwrap_or_else(|e| {
            warn!(repo = %repo.full_name(), sha = %sha, error = %e, "Failed to fetch check runs");
            Vec::new()
        });
        pr.commit_statuses = statuses.unwrap_or_else(|e| {
            warn!(repo = %repo.full_name(), sha = %sha, error = %e, "Failed to fetch commit statuses");
            Vec::new()
        });

        pr.check_runs = join_all(
            runs.into_iter()
                .map(|run| self.attach_workflow_jobs(&repo, run, workflow_app)),
        )
        .await;

        pr
    }

    async fn fetch_pull_detail(
        &self,
        repo: &RepositoryRef,
        number: u32,
    ) -> Result<PullRequest, ApiError> {
        let path = format!("/repos/{}/{}/pulls/{}", repo.owner, repo.name, number);
        let data = self.call(ApiRequest::get(path)).await?;
        if !data.is_object() {
            return Err(ApiError::decoding("Pull request detail is not an object"));
        }
        Ok(map_rest_pull_request(&data, self.repo_urls))
    }

    async fn fetch_check_runs(
        &self,
        repo: &RepositoryRef,
        sha: &str,
    ) -> Result<Vec<CheckRun>, ApiError> {
        let path = format!(
            "/repos/{}/{}/commits/{}/check-runs",
            repo.owner, repo.name, sha
        );
        let data = self
            .call(ApiRequest::get(path).param("per_page", PAGE_SIZE.to_string()))
            .await?;
        let runs = data["check_runs"]
            .as_array()
            .ok_or_else(|| ApiError::decoding("Missing check_runs"))?
            .iter()
            .map(|node| map_check_run(node, None))
            .collect();
        Ok(dedup_check_runs(runs))
    }

    /// Combined status for `sha`: GitHub returns the newest status per
    /// context, and the list is folded again in case a context repeats.
    async fn fetch_commit_statuses(
        &self,
        repo: &RepositoryRef,
        sha: &str,
    ) -> Result<Vec<CommitStatus>, ApiError> {
        let path = format!("/repos/{}/{}/commits/{}/status", repo.owner, repo.name, sha);
        let data = self
            .call(ApiRequest::get(path).param("per_page", PAGE_SIZE.to_string()))
            .await?;
        let statuses = data["statuses"]
            .as_array()
            .ok_or_else(|| ApiError::decoding("Missing statuses"))?
            .iter()
            .map(map_commit_status)
            .collect();
        Ok(latest_status_per_context(statuses))
    }

    async fn attach_workflow_jobs(
        &self,
        repo: &RepositoryRef,
        mut run: CheckRun,
        workflow_app: &str,
    ) -> CheckRun {
        if run.app_slug.as_deref() != Some(workflow_app) {
            return run;
        }

        let path = format!("/repos/{}/{}/actions/jobs/{}", repo.owner, repo.name, run.id);
        match self.call(ApiRequest::get(path)).await {
            Ok(data) if data.is_object() => {
                run.jobs = Some(vec![map_workflow_job(&data)]);
            }
            Ok(_) => {
                warn!(check_run = run.id, "Workflow job response is not an object");
            }
            Err(e) => {
                warn!(check_run = run.id, error = %e, "Failed to fetch workflow job");
            }
        }
        run
    }
}

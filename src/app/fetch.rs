use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::app::state::QueryResult;
use crate::github::api::ApiSession;
use crate::github::error::ApiError;
use crate::github::gateway::Gateway;
use crate::github::mapper::RepositoryUrlPattern;
use crate::github::models::PullRequest;
use crate::util::config::{GithubConfig, QueryConfiguration, Transport};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub transport: Transport,
    /// Upper bound on simultaneous gateway calls within one cycle.
    pub max_concurrency: usize,
    pub max_results_per_query: usize,
    /// Check runs from this app get workflow-job detail on the REST path.
    pub workflow_app_slug: String,
    /// REST base, used to recognise repository URLs.
    pub api_url: String,
}

impl FetchOptions {
    pub fn from_config(config: &GithubConfig) -> Self {
        Self {
            transport: config.transport,
            max_concurrency: config.max_concurrency,
            max_results_per_query: config.max_results_per_query,
            workflow_app_slug: config.workflow_app_slug.clone(),
            api_url: config.api_url.clone(),
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&GithubConfig::default())
    }
}

/// Output of one successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub viewer_login: String,
    /// In configured query order.
    pub results: Vec<QueryResult>,
}

pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    options: FetchOptions,
    repo_urls: RepositoryUrlPattern,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn Gateway>, options: FetchOptions) -> Self {
        let repo_urls = RepositoryUrlPattern::new(&options.api_url);
        Self {
            gateway,
            options,
            repo_urls,
        }
    }

    /// Run every query concurrently and return results in `queries` order.
    ///
    /// Only the viewer lookup can fail the cycle; a failing query yields an
    /// empty result for that query alone.
    pub async fn fetch_all(
        &self,
        queries: &[QueryConfiguration],
        credential: &str,
    ) -> Result<CycleReport, ApiError> {
        let permits = Semaphore::new(self.options.max_concurrency.max(1));
        let session = ApiSession::new(
            self.gateway.as_ref(),
            credential,
            &permits,
            &self.repo_urls,
        );

        let viewer_login = session.fetch_viewer().await.inspect_err(|e| {
            error!(error = %e, "Failed to fetch authenticated user");
        })?;

        info!(queries = queries.len(), "Fetching queries");

        let mut in_flight: FuturesUnordered<_> = queries
            .iter()
            .enumerate()
            .map(|(index, query)| {
                let session = &session;
                async move { (index, self.fetch_query(session, query).await) }
            })
            .collect();

        // Barrier: nothing is published until every query has settled.
        let mut arrived = Vec::with_capacity(queries.len());
        while let Some(result) = in_flight.next().await {
            arrived.push(result);
        }

        Ok(CycleReport {
            viewer_login,
            results: order_results(arrived, queries),
        })
    }

    async fn fetch_query(&self, session: &ApiSession<'_>, query: &QueryConfiguration) -> QueryResult {
        debug!(query = %query.id, "Fetching query");
        let limit = self.options.max_results_per_query;

        let fetched = match self.options.transport {
            Transport::GraphQl => session.search_graphql(&query.query, limit).await,
            Transport::Rest => match session.search_rest(&query.query, limit).await {
                Ok(prs) => Ok(self.enrich_all(session, prs).await),
                Err(e) => Err(e),
            },
        };

        let pull_requests = fetched.unwrap_or_else(|e| {
            warn!(query = %query.id, error = %e, "Query fetch failed, using empty result");
            Vec::new()
        });

        debug!(query = %query.id, count = pull_requests.len(), "Query fetched");
        QueryResult {
            query: query.clone(),
            pull_requests,
        }
    }

    async fn enrich_all(&self, session: &ApiSession<'_>, prs: Vec<PullRequest>) -> Vec<PullRequest> {
        let slug = self.options.workflow_app_slug.as_str();
        join_all(
            prs.into_iter()
                .map(|pr| session.enrich_pull_request(pr, slug)),
        )
        .await
    }
}

/// Sort arrived `(input index, result)` pairs by the position of each
/// result's query id in `queries`, falling back to input index on ties.
pub fn order_results(
    mut arrived: Vec<(usize, QueryResult)>,
    queries: &[QueryConfiguration],
) -> Vec<QueryResult> {
    let mut position: HashMap<&str, usize> = HashMap::with_capacity(queries.len());
    for (index, query) in queries.iter().enumerate() {
        position.entry(query.id.as_str()).or_insert(index);
    }

    arrived.sort_by_key(|(index, result)| {
        let rank = position
            .get(result.query.id.as_str())
            .copied()
            .unwrap_or(usize::MAX);
        (rank, *index)
    });
    arrived.into_iter().map(|(_, result)| result).collect()
}

use std::error::Error as _;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use super::error::{ApiError, TransportKind};
use super::gateway::{ApiRequest, Gateway};
use crate::util::config::GithubConfig;

const API_VERSION: &str = "2022-11-28";
const REST_ACCEPT: &str = "application/vnd.github+json";

/// reqwest-backed `Gateway` talking to github.com or a GitHub Enterprise host.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_url: String,
    graphql_url: String,
}

impl GithubClient {
    pub fn new(api_url: &str, graphql_url: &str) -> Result<Self> {
        Self::build(
            api_url,
            graphql_url,
            Duration::from_secs(30),
            Duration::from_secs(10),
        )
    }

    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        Self::build(
            &config.api_url,
            &config.graphql_url,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    fn build(
        api_url: &str,
        graphql_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        for url in [api_url, graphql_url] {
            if !is_allowed_url(url) {
                bail!("GitHub API URL must use HTTPS: {}", url);
            }
        }

        let client = Client::builder()
            .user_agent("prwatch")
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            graphql_url: graphql_url.to_string(),
        })
    }

    async fn send_graphql(
        &self,
        credential: &str,
        query: &str,
        variables: &Value,
    ) -> Result<Value, ApiError> {
        let body = json!({
            "query": query,
            "variables": variables,
        });

        let resp = self
            .client
            .post(&self.graphql_url)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let data = read_json(resp).await?;
        check_graphql_errors(&data)?;
        Ok(data)
    }

    async fn send_rest(
        &self,
        credential: &str,
        method: reqwest::Method,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.api_url, path);
        let resp = self
            .client
            .request(method, &url)
            .bearer_auth(credential)
            .header("Accept", REST_ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(params)
            .send()
            .await
            .map_err(transport_error)?;

        read_json(resp).await
    }
}

#[async_trait]
impl Gateway for GithubClient {
    async fn execute(&self, credential: &str, request: ApiRequest) -> Result<Value, ApiError> {
        debug!(request = %request.describe(), "GitHub API call");
        match request {
            ApiRequest::GraphQl { query, variables } => {
                self.send_graphql(credential, &query, &variables).await
            }
            ApiRequest::Rest {
                method,
                path,
                params,
            } => self.send_rest(credential, method, &path, &params).await,
        }
    }
}

fn is_allowed_url(url: &str) -> bool {
    url.starts_with("https://")
        || url.starts_with("http://127.0.0.1")
        || url.starts_with("http://localhost")
}

async fn read_json(resp: Response) -> Result<Value, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let headers = resp.headers().clone();
        let text = resp.text().await.unwrap_or_default();
        return Err(classify_status(status, &headers, &text));
    }

    let text = resp.text().await.map_err(|e| {
        if e.is_timeout() {
            transport_error(e)
        } else {
            ApiError::decoding(e.to_string())
        }
    })?;

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| ApiError::decoding(e.to_string()))
}

/// Map a non-2xx response onto the error taxonomy.
pub fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            if status == StatusCode::TOO_MANY_REQUESTS || is_rate_limit_exhausted(headers, body) {
                ApiError::RateLimited {
                    reset_at: rate_limit_reset(headers),
                }
            } else {
                ApiError::Forbidden
            }
        }
        StatusCode::NOT_FOUND => ApiError::NotFound,
        other => ApiError::Http(other.as_u16()),
    }
}

fn is_rate_limit_exhausted(headers: &HeaderMap, body: &str) -> bool {
    let remaining_zero = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    remaining_zero || body.to_lowercase().contains("rate limit")
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// A non-empty `errors` array fails the call even when `data` is present.
fn check_graphql_errors(data: &Value) -> Result<(), ApiError> {
    let Some(errors) = data.get("errors").and_then(Value::as_array) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }

    let rate_limited = errors
        .iter()
        .any(|e| e["type"].as_str() == Some("RATE_LIMITED"));
    if rate_limited {
        return Err(ApiError::RateLimited { reset_at: None });
    }

    let messages = errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown GraphQL error")
                .to_string()
        })
        .collect();
    Err(ApiError::GraphQl(messages))
}

fn transport_error(err: reqwest::Error) -> ApiError {
    let kind = if err.is_timeout() {
        TransportKind::Timeout
    } else if err.is_connect() {
        connect_failure_kind(&err)
    } else {
        TransportKind::Other
    };
    ApiError::transport(kind, err.to_string())
}

fn connect_failure_kind(err: &reqwest::Error) -> TransportKind {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::TimedOut => TransportKind::Timeout,
                io::ErrorKind::NetworkUnreachable | io::ErrorKind::NetworkDown => {
                    TransportKind::NoConnectivity
                }
                _ => TransportKind::HostUnreachable,
            };
        }
        source = inner.source();
    }
    // DNS failures surface without an io::Error underneath.
    TransportKind::HostUnreachable
}

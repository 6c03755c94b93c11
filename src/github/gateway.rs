//! The capability seam between the fetch pipeline and the network.
//!
//! Everything above this trait works on `serde_json::Value` payloads and
//! `ApiError`s, so tests can substitute an in-process fake for the real
//! reqwest-backed client.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::error::ApiError;

/// One call against the code-hosting API.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// POST of `{query, variables}` to the single GraphQL endpoint.
    GraphQl { query: String, variables: Value },
    /// A REST resource call relative to the API base URL.
    Rest {
        method: Method,
        path: String,
        params: Vec<(String, String)>,
    },
}

impl ApiRequest {
    pub fn graphql(query: &str, variables: Value) -> Self {
        Self::GraphQl {
            query: query.to_string(),
            variables,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::Rest {
            method: Method::GET,
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Appends a query-string parameter. No-op for GraphQL requests.
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        if let Self::Rest { params, .. } = &mut self {
            params.push((key.to_string(), value.into()));
        }
        self
    }

    /// Short label used in log fields.
    pub fn describe(&self) -> String {
        match self {
            ApiRequest::GraphQl { .. } => "POST graphql".to_string(),
            ApiRequest::Rest { method, path, .. } => format!("{method} {path}"),
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Execute `request` authenticated with `credential`.
    ///
    /// Returns the decoded JSON payload on 2xx. For GraphQL requests the
    /// whole `{data, errors}` envelope is returned once `errors` has been
    /// checked to be empty. No retries happen here.
    async fn execute(&self, credential: &str, request: ApiRequest) -> Result<Value, ApiError>;
}

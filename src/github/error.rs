use chrono::{DateTime, Utc};
use thiserror::Error;

/// Transport-layer failure subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    NoConnectivity,
    Timeout,
    HostUnreachable,
    Other,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportKind::NoConnectivity => "no connectivity",
            TransportKind::Timeout => "timed out",
            TransportKind::HostUnreachable => "host unreachable",
            TransportKind::Other => "transport failure",
        };
        f.write_str(s)
    }
}

/// Errors surfaced by the gateway and the fetch pipeline on top of it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("GitHub rejected the credential")]
    Unauthorized,

    #[error("GitHub denied access to the resource")]
    Forbidden,

    #[error("GitHub API rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("GitHub resource not found")]
    NotFound,

    #[error("GitHub API returned HTTP {0}")]
    Http(u16),

    #[error("Network error ({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("GraphQL error: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("Failed to decode GitHub response: {0}")]
    Decoding(String),

    #[error("No GitHub credential configured")]
    MissingCredential,
}

impl ApiError {
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding(message.into())
    }

    /// Failures that are likely to clear up on the next scheduled cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport { .. })
    }

    /// The fixed, human-readable sentence shown for this kind of failure.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized => {
                "Authentication failed. Please check your GitHub token.".to_string()
            }
            ApiError::Forbidden => {
                "Access denied. Your token may be missing the required scopes.".to_string()
            }
            ApiError::RateLimited { .. } => {
                "GitHub API rate limit exceeded. Please try again later.".to_string()
            }
            ApiError::NotFound => "The requested resource was not found.".to_string(),
            ApiError::Http(code) => format!("GitHub returned an unexpected error (HTTP {code})."),
            ApiError::Transport { kind, .. } => match kind {
                TransportKind::NoConnectivity => {
                    "No internet connection. Please check your network.".to_string()
                }
                TransportKind::Timeout => "The request to GitHub timed out.".to_string(),
                TransportKind::HostUnreachable => "Could not reach GitHub.".to_string(),
                TransportKind::Other => "A network error occurred.".to_string(),
            },
            ApiError::GraphQl(_) => "GitHub could not process the search query.".to_string(),
            ApiError::Decoding(_) => "Received an unexpected response from GitHub.".to_string(),
            ApiError::MissingCredential => {
                "No GitHub token configured. Please add a token to continue.".to_string()
            }
        }
    }
}

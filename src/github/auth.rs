use std::fmt;
use std::process::Command;

use anyhow::{Result, bail};
use tracing::debug;

use crate::store::SecretStore;

/// Where a discovered credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    GhCli,
    GithubTokenEnv,
    GhTokenEnv,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::GhCli => write!(f, "gh CLI"),
            TokenSource::GithubTokenEnv => write!(f, "GITHUB_TOKEN"),
            TokenSource::GhTokenEnv => write!(f, "GH_TOKEN"),
        }
    }
}

/// Discover a token from the environment, in order:
/// 1. `gh auth token` subprocess
/// 2. `GITHUB_TOKEN` environment variable
/// 3. `GH_TOKEN` environment variable
pub fn discover_token() -> Option<(String, TokenSource)> {
    debug!("Attempting to resolve token via `gh auth token`");
    if let Ok(output) = Command::new("gh").args(["auth", "token"]).output()
        && output.status.success()
    {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some((token, TokenSource::GhCli));
        }
    }

    token_from_env(|name| std::env::var(name).ok())
}

/// Env-var half of [`discover_token`], with the lookup injected.
pub fn token_from_env(
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<(String, TokenSource)> {
    [
        ("GITHUB_TOKEN", TokenSource::GithubTokenEnv),
        ("GH_TOKEN", TokenSource::GhTokenEnv),
    ]
    .into_iter()
    .find_map(|(name, source)| {
        lookup(name)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| (t, source))
    })
}

/// Make sure `store` holds a credential, discovering one if it is empty.
pub fn seed_secret_store(store: &dyn SecretStore) -> Result<()> {
    if store.get_credential().is_some() {
        return Ok(());
    }

    let Some((token, source)) = discover_token() else {
        bail!(
            "Could not resolve GitHub token. Please either:\n\
             - Run `gh auth login` to authenticate with the GitHub CLI\n\
             - Set the GITHUB_TOKEN environment variable\n\
             - Set the GH_TOKEN environment variable"
        );
    };

    if !store.set_credential(&token) {
        bail!("Failed to store credential from {source}");
    }
    debug!(%source, "Credential stored");
    Ok(())
}

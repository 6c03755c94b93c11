use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub queries: Vec<QueryConfiguration>,
}

/// How search results are pulled from GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// One GraphQL search per query, checks included.
    #[default]
    GraphQl,
    /// REST issue search plus per-PR enrichment calls.
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_max_results")]
    pub max_results_per_query: usize,
    #[serde(default = "default_workflow_app")]
    pub workflow_app_slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayLayout {
    Compact,
    #[default]
    Detailed,
}

/// One user-defined search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfiguration {
    pub id: String,
    pub title: String,
    pub query: String,
    #[serde(default = "default_true")]
    pub include_in_failing_checks_count: bool,
    #[serde(default = "default_true")]
    pub include_in_pending_reviews_count: bool,
    #[serde(default)]
    pub layout: DisplayLayout,
}

impl QueryConfiguration {
    pub fn new(id: &str, title: &str, query: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            query: query.to_string(),
            include_in_failing_checks_count: true,
            include_in_pending_reviews_count: true,
            layout: DisplayLayout::default(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_max_concurrency() -> usize {
    4
}
fn default_max_results() -> usize {
    100
}
fn default_workflow_app() -> String {
    "github-actions".to_string()
}
fn default_refresh_interval() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            graphql_url: default_graphql_url(),
            transport: Transport::default(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_concurrency: default_max_concurrency(),
            max_results_per_query: default_max_results(),
            workflow_app_slug: default_workflow_app(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        for config_path in Self::candidate_paths() {
            if config_path.exists() {
                return Self::load_file(&config_path);
            }
        }

        Ok(AppConfig::default())
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.config/prwatch/config.toml`, then the platform config dir
    /// (macOS: `~/Library/Application Support/prwatch/`).
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(home).join(".config/prwatch/config.toml"));
        }
        if let Some(proj_dirs) = ProjectDirs::from("", "", "prwatch") {
            candidates.push(proj_dirs.config_dir().join("config.toml"));
        }
        candidates
    }

    pub fn validate(&self) -> Result<()> {
        if self.dashboard.refresh_interval_secs == 0 {
            bail!("dashboard.refresh_interval_secs must be greater than zero");
        }
        if self.github.max_concurrency == 0 {
            bail!("github.max_concurrency must be greater than zero");
        }

        let mut seen = HashSet::new();
        for query in &self.queries {
            if query.query.trim().is_empty() {
                bail!("Query '{}' has an empty search string", query.id);
            }
            if !seen.insert(query.id.as_str()) {
                bail!("Duplicate query id: {}", query.id);
            }
        }
        Ok(())
    }

    pub fn log_dir(&self) -> PathBuf {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "prwatch") {
            return proj_dirs.data_dir().join("logs");
        }
        PathBuf::from(".local/share/prwatch/logs")
    }
}

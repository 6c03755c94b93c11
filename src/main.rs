use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prwatch::app::view::render_summary;
use prwatch::app::{AppContext, FetchOptions, RefreshState, Scheduler, SchedulerHandle, Snapshot};
use prwatch::github::{GithubClient, auth};
use prwatch::store::{MemorySecretStore, MemorySettingsStore, Settings};
use prwatch::util::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "prwatch", version, about = "Watch GitHub pull requests and their CI status")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single refresh, print it and exit
    #[arg(long)]
    once: bool,

    /// Enable debug logging to file
    #[arg(short, long)]
    debug: bool,

    /// Override the auto-refresh interval, in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(secs) = cli.interval {
        config.dashboard.refresh_interval_secs = secs;
    }

    let _guard = setup_logging(&config, cli.debug)?;

    info!("prwatch starting");

    if config.queries.is_empty() {
        eprintln!(
            "No queries configured. Add at least one to your config file.\n\
             Example config (~/.config/prwatch/config.toml):\n\n\
             [[queries]]\n\
             id = \"mine\"\n\
             title = \"My pull requests\"\n\
             query = \"is:open is:pr author:@me\""
        );
        std::process::exit(1);
    }

    let secrets = Arc::new(MemorySecretStore::new());
    if let Err(e) = auth::seed_secret_store(secrets.as_ref()) {
        eprintln!("Authentication error: {e}");
        std::process::exit(1);
    }

    let client = GithubClient::from_config(&config.github)?;
    let settings = Arc::new(MemorySettingsStore::from_config(&config));
    let ctx = AppContext::new(
        Arc::new(client),
        settings.clone(),
        secrets,
        FetchOptions::from_config(&config.github),
    );

    let (handle, task) = Scheduler::spawn(ctx);

    let result = if cli.once {
        run_once(&handle).await
    } else {
        let interval = Duration::from_secs(config.dashboard.refresh_interval_secs);
        run_watch(&handle, &settings, cli.config.as_deref(), cli.interval, interval).await
    };

    handle.shutdown();
    let _ = task.await;
    result
}

async fn run_once(handle: &SchedulerHandle) -> Result<()> {
    handle.refresh().await;
    let snapshot = handle
        .wait_for(|s| s.state.is_settled())
        .await
        .context("Scheduler stopped before the refresh finished")?;

    print!("{}", render_summary(&snapshot, chrono::Utc::now()));
    if let RefreshState::Error(_) = snapshot.state {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_watch(
    handle: &SchedulerHandle,
    settings: &MemorySettingsStore,
    config_path: Option<&Path>,
    interval_override: Option<u64>,
    interval: Duration,
) -> Result<()> {
    let mut snapshots = handle.subscribe();
    handle.refresh().await;
    handle.start_auto_refresh(interval);

    let mut reload = ReloadSignal::new()?;
    let mut last_printed: Option<Snapshot> = None;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.state.is_settled() && last_printed.as_ref() != Some(&snapshot) {
                    print!("{}", render_summary(&snapshot, chrono::Utc::now()));
                    last_printed = Some(snapshot);
                }
            }
            _ = reload.recv() => {
                reload_settings(settings, config_path, interval_override);
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }
    Ok(())
}

fn reload_settings(settings: &MemorySettingsStore, path: Option<&Path>, interval_override: Option<u64>) {
    match AppConfig::load(path) {
        Ok(mut config) => {
            if let Some(secs) = interval_override {
                config.dashboard.refresh_interval_secs = secs;
            }
            info!(queries = config.queries.len(), "Config reloaded");
            settings.replace(Settings::from_config(&config));
        }
        Err(e) => warn!(error = %e, "Config reload failed, keeping previous settings"),
    }
}

#[cfg(unix)]
struct ReloadSignal(tokio::signal::unix::Signal);

#[cfg(unix)]
impl ReloadSignal {
    fn new() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        let hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
        Ok(Self(hangup))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct ReloadSignal;

#[cfg(not(unix))]
impl ReloadSignal {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}

fn setup_logging(
    config: &AppConfig,
    debug: bool,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    if !debug {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("prwatch=info"));
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log dir: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "prwatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("prwatch=debug")
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

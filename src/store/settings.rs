use std::sync::RwLock;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::util::config::{AppConfig, QueryConfiguration};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Persisted order is display order.
    pub queries: Vec<QueryConfiguration>,
    pub refresh_interval: Duration,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            queries: config.queries.clone(),
            refresh_interval: Duration::from_secs(config.dashboard.refresh_interval_secs),
        }
    }
}

/// Ordered query list plus refresh interval, with change notification.
pub trait SettingsStore: Send + Sync {
    fn queries(&self) -> Vec<QueryConfiguration>;
    fn refresh_interval(&self) -> Duration;
    /// Generation counter bumped on every change.
    fn changes(&self) -> watch::Receiver<u64>;
}

#[derive(Debug)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
    generation: watch::Sender<u64>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            settings: RwLock::new(settings),
            generation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Settings::from_config(config))
    }

    /// Swap in new settings and notify subscribers.
    pub fn replace(&self, settings: Settings) {
        if let Ok(mut slot) = self.settings.write() {
            *slot = settings;
        }
        self.generation.send_modify(|g| *g += 1);
        debug!(generation = *self.generation.borrow(), "Settings replaced");
    }

    fn read(&self) -> Option<Settings> {
        self.settings.read().ok().map(|s| s.clone())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn queries(&self) -> Vec<QueryConfiguration> {
        self.read().map(|s| s.queries).unwrap_or_default()
    }

    fn refresh_interval(&self) -> Duration {
        self.read()
            .map(|s| s.refresh_interval)
            .unwrap_or(Duration::from_secs(300))
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}
